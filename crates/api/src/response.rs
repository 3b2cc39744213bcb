//! Shared response envelope types for API handlers.

use serde::Serialize;

/// `{ "user": T }` envelope returned by account endpoints.
#[derive(Debug, Serialize)]
pub struct UserEnvelope<T: Serialize> {
    pub user: T,
}
