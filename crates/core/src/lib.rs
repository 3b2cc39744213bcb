//! Domain types, lifecycle rules, and validation shared by the persistence
//! and HTTP layers. Has no internal dependencies.

pub mod client;
pub mod error;
pub mod host;
pub mod session;
pub mod status;
pub mod types;
pub mod user;
