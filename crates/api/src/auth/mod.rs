//! Authentication primitives.
//!
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`jwt`] -- access-token issuing and validation.
//! - [`refresh`] -- opaque, server-side refresh tokens.

pub mod jwt;
pub mod password;
pub mod refresh;
