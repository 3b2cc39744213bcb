//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the database row
//! - `Deserialize` create/update DTOs
//! - A `Serialize` response shape where the row is not safe or convenient to
//!   expose directly

pub mod client;
pub mod host;
pub mod refresh_token;
pub mod session;
pub mod user;
