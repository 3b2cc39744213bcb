//! Session lifecycle rules.
//!
//! ```text
//! PENDING --start--> ACTIVE --end--> ENDED
//!    |                  |
//!    +----cancel--------+----cancel--> CANCELLED
//! ```
//!
//! `ENDED` and `CANCELLED` are terminal. [`SessionStatus::can_transition_to`]
//! holds the edges; the `ensure_*` preconditions and the guarded updates in
//! the session repository are both derived from it.

use chrono::Duration;
use uuid::Uuid;

use crate::status::SessionStatus;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Lifetime of a session measured from its creation.
pub const SESSION_TTL_MINS: i64 = 60;

/// Prefix of every server-generated session token.
pub const SESSION_TOKEN_PREFIX: &str = "session_";

/// Reason recorded when `start` is attempted on an expired pending session.
pub const REASON_EXPIRED_BEFORE_START: &str = "Session expired before starting";

/// Reason recorded by the janitor sweep.
pub const REASON_EXPIRED: &str = "Session expired";

/// Reason used when the caller cancels without giving one.
pub const DEFAULT_CANCEL_REASON: &str = "Cancelled by user";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures raised by session coordination.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Host {0} not found")]
    HostNotFound(DbId),

    #[error("Host {0} does not belong to user")]
    HostOwnershipMismatch(DbId),

    #[error("Client {0} not found")]
    ClientNotFound(DbId),

    #[error("Client {0} does not belong to user")]
    ClientOwnershipMismatch(DbId),

    #[error("Host {0} is not available for sessions")]
    HostUnavailable(DbId),

    #[error("Host {0} already has an active session")]
    HostBusy(DbId),

    #[error("Session {0} not found")]
    SessionNotFound(DbId),

    #[error("Session {0} does not belong to user")]
    SessionOwnershipMismatch(DbId),

    #[error("Session is {actual}, expected {expected}")]
    InvalidState {
        expected: SessionStatus,
        actual: SessionStatus,
    },

    #[error("Session {0} has expired")]
    SessionExpired(DbId),

    #[error("Session is already {0}")]
    AlreadyTerminal(SessionStatus),

    #[error("Failed to start session: {0}")]
    SessionStartFailed(String),
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

impl SessionStatus {
    /// `ENDED` and `CANCELLED` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Cancelled)
    }

    /// Statuses the janitor reconciles when they outlive their expiry.
    pub fn is_live(self) -> bool {
        matches!(self, SessionStatus::Pending | SessionStatus::Active)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Pending, Active) | (Active, Ended) | (Pending, Cancelled) | (Active, Cancelled)
        )
    }
}

/// Statuses from which `target` is reachable in one step.
pub fn transition_sources(target: SessionStatus) -> Vec<SessionStatus> {
    SessionStatus::ALL
        .iter()
        .copied()
        .filter(|from| from.can_transition_to(target))
        .collect()
}

/// Precondition for `start`: the session must be pending.
pub fn ensure_can_start(current: SessionStatus) -> Result<(), SessionError> {
    ensure_transition(current, SessionStatus::Active, SessionStatus::Pending)
}

/// Precondition for `end`: the session must be active.
pub fn ensure_can_end(current: SessionStatus) -> Result<(), SessionError> {
    ensure_transition(current, SessionStatus::Ended, SessionStatus::Active)
}

/// Precondition for `cancel`: the session must not be terminal.
pub fn ensure_can_cancel(current: SessionStatus) -> Result<(), SessionError> {
    if current.can_transition_to(SessionStatus::Cancelled) {
        return Ok(());
    }
    Err(SessionError::AlreadyTerminal(current))
}

/// `expected` is the status reported back when the edge is missing.
fn ensure_transition(
    actual: SessionStatus,
    target: SessionStatus,
    expected: SessionStatus,
) -> Result<(), SessionError> {
    if actual.can_transition_to(target) {
        return Ok(());
    }
    Err(SessionError::InvalidState { expected, actual })
}

// ---------------------------------------------------------------------------
// Expiry and tokens
// ---------------------------------------------------------------------------

/// Expiry instant for a session created at `created_at`.
pub fn expiry_from(created_at: Timestamp) -> Timestamp {
    created_at + Duration::minutes(SESSION_TTL_MINS)
}

/// A session is expired once `now` is strictly past `expires_at`.
pub fn is_expired(expires_at: Timestamp, now: Timestamp) -> bool {
    expires_at < now
}

/// Mint a new session token: the prefix followed by 32 lowercase hex digits.
pub fn generate_session_token() -> String {
    format!("{SESSION_TOKEN_PREFIX}{}", Uuid::new_v4().simple())
}

/// Ownership is decided by identifier, never by comparing whole rows.
pub fn owned_by(owner_id: DbId, user_id: DbId) -> bool {
    owner_id == user_id
}

/// Build the reason recorded when the host could not start a session.
pub fn start_failure_reason(cause: &str) -> String {
    format!("Failed to start session: {cause}")
}
