//! Client endpoint model and DTOs.

use imperium_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `clients` table.
#[derive(Debug, Clone, FromRow)]
pub struct Client {
    pub id: DbId,
    pub owner_id: DbId,
    pub name: String,
    pub ip_address: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// API representation of a client.
#[derive(Debug, Clone, Serialize)]
pub struct ClientResponse {
    pub id: DbId,
    pub client_name: String,
    pub ip_address: String,
}

impl From<&Client> for ClientResponse {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id,
            client_name: client.name.clone(),
            ip_address: client.ip_address.clone(),
        }
    }
}

/// DTO for creating or updating a client.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateClient {
    pub client_name: String,
    pub ip_address: String,
}
