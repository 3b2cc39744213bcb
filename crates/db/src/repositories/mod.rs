//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods. Reads and
//! single-statement writes accept any [`sqlx::PgExecutor`] so they can run
//! against the pool or inside a caller's transaction; multi-statement
//! operations take `&PgPool` and open their own transaction.

pub mod client_repo;
pub mod host_repo;
pub mod refresh_token_repo;
pub mod session_repo;
pub mod user_repo;

pub use client_repo::ClientRepo;
pub use host_repo::HostRepo;
pub use refresh_token_repo::RefreshTokenRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;

/// Result of an explicit, ordered deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The row and its dependents were removed.
    Deleted,
    /// No row with the given id exists.
    NotFound,
    /// A PENDING or ACTIVE session still references the row; nothing was deleted.
    HasLiveSessions,
}
