//! Imperium API server library.
//!
//! Exposes config, state, error handling, session coordination and routes so
//! integration tests and the binary entrypoint share them.

pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod sessions;
pub mod signaling;
pub mod state;
