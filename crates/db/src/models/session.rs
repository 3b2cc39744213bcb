//! Remote-control session model and DTOs.

use imperium_core::status::{SessionStatus, StatusId};
use imperium_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `sessions` table.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: DbId,
    pub user_id: DbId,
    pub host_id: DbId,
    pub client_id: DbId,
    pub status_id: StatusId,
    pub session_token: String,
    pub program_id: Option<String>,
    pub webrtc_offer: Option<String>,
    pub webrtc_answer: Option<String>,
    pub expires_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub end_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Session {
    /// Decode `status_id`.
    ///
    /// The column references `session_statuses`, so an unknown id means the
    /// lookup table and [`SessionStatus`] have drifted apart; such rows are
    /// reported as cancelled so no transition can act on them.
    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_id(self.status_id).unwrap_or(SessionStatus::Cancelled)
    }
}

/// A session joined with the names of its host and client.
#[derive(Debug, Clone, FromRow)]
pub struct SessionDetail {
    pub id: DbId,
    pub user_id: DbId,
    pub host_id: DbId,
    pub host_name: String,
    pub client_id: DbId,
    pub client_name: String,
    pub status_id: StatusId,
    pub session_token: String,
    pub program_id: Option<String>,
    pub webrtc_offer: Option<String>,
    pub webrtc_answer: Option<String>,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub end_reason: Option<String>,
}

impl SessionDetail {
    /// Decode `status_id` (see [`Session::status`]).
    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_id(self.status_id).unwrap_or(SessionStatus::Cancelled)
    }
}

/// Full session representation.
///
/// This is both the API response body and the payload posted to the host's
/// signaling endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub id: DbId,
    pub host_id: DbId,
    pub host_name: String,
    pub client_id: DbId,
    pub client_name: String,
    pub status: SessionStatus,
    pub session_token: String,
    pub program_id: Option<String>,
    pub webrtc_offer: Option<String>,
    pub webrtc_answer: Option<String>,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub end_reason: Option<String>,
}

impl From<SessionDetail> for SessionResponse {
    fn from(detail: SessionDetail) -> Self {
        Self {
            status: detail.status(),
            id: detail.id,
            host_id: detail.host_id,
            host_name: detail.host_name,
            client_id: detail.client_id,
            client_name: detail.client_name,
            session_token: detail.session_token,
            program_id: detail.program_id,
            webrtc_offer: detail.webrtc_offer,
            webrtc_answer: detail.webrtc_answer,
            expires_at: detail.expires_at,
            created_at: detail.created_at,
            started_at: detail.started_at,
            ended_at: detail.ended_at,
            end_reason: detail.end_reason,
        }
    }
}

/// Compact listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: DbId,
    pub host_name: String,
    pub client_name: String,
    pub status: SessionStatus,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
}

impl From<SessionDetail> for SessionSummary {
    fn from(detail: SessionDetail) -> Self {
        Self {
            status: detail.status(),
            id: detail.id,
            host_name: detail.host_name,
            client_name: detail.client_name,
            created_at: detail.created_at,
            started_at: detail.started_at,
            ended_at: detail.ended_at,
        }
    }
}

/// DTO for inserting a new pending session.
pub struct CreateSession {
    pub user_id: DbId,
    pub host_id: DbId,
    pub client_id: DbId,
    pub session_token: String,
    pub program_id: Option<String>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

/// Request body for `POST /sessions`.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub host_id: DbId,
    pub client_id: DbId,
    pub program_id: Option<String>,
}

/// Request body for `POST /sessions/{id}/start`.
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub webrtc_offer: String,
}

/// Request body for `POST /sessions/{id}/end`.
#[derive(Debug, Default, Deserialize)]
pub struct EndSessionRequest {
    pub reason: Option<String>,
    pub webrtc_answer: Option<String>,
}
