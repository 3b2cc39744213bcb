//! Host entity model and DTOs.

use imperium_core::status::{HostStatus, StatusId};
use imperium_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `hosts` table.
#[derive(Debug, Clone, FromRow)]
pub struct Host {
    pub id: DbId,
    pub owner_id: DbId,
    pub name: String,
    pub ip_address: String,
    pub port: i32,
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Host {
    /// Decode `status_id`. Unknown ids are treated as offline.
    pub fn status(&self) -> HostStatus {
        HostStatus::from_id(self.status_id).unwrap_or(HostStatus::Offline)
    }
}

/// API representation of a host.
#[derive(Debug, Clone, Serialize)]
pub struct HostResponse {
    pub id: DbId,
    pub name: String,
    pub ip_address: String,
    pub port: i32,
    pub status: HostStatus,
}

impl From<&Host> for HostResponse {
    fn from(host: &Host) -> Self {
        Self {
            id: host.id,
            name: host.name.clone(),
            ip_address: host.ip_address.clone(),
            port: host.port,
            status: host.status(),
        }
    }
}

/// DTO for registering a host.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateHost {
    pub name: String,
    pub ip_address: String,
    pub port: i32,
}

/// DTO for a full host update.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateHost {
    pub ip_address: String,
    pub port: i32,
    pub status: HostStatus,
}

/// DTO for an operator status overwrite.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateHostStatus {
    pub status: HostStatus,
}
