//! Opaque refresh tokens.
//!
//! A refresh token is 32 random bytes, hex encoded, handed to the client once.
//! Only an HMAC-SHA256 digest keyed with the refresh secret is stored, so
//! deleting the row revokes the token and a database dump does not reveal
//! usable tokens. Tokens are not rotated on use; they stay valid until they
//! expire or are revoked.

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use imperium_core::types::{DbId, Timestamp};
use imperium_db::models::refresh_token::{CreateRefreshToken, RefreshToken};
use imperium_db::repositories::RefreshTokenRepo;
use rand::RngCore;
use sha2::Sha256;
use sqlx::PgPool;

use crate::auth::jwt::{JwtConfig, TokenError};
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes in a refresh token.
const TOKEN_BYTES: usize = 32;

/// A freshly minted token: the plaintext for the client plus the stored row.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub record: RefreshToken,
}

/// Generate a random refresh token (64 lowercase hex characters).
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    to_hex(&bytes)
}

/// Digest a refresh token with the refresh secret.
pub fn hash_refresh_token(token: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(token.as_bytes());
    to_hex(&mac.finalize().into_bytes())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Mint and persist a refresh token for a user, valid for the configured
/// number of days from now.
pub async fn create(
    pool: &PgPool,
    user_id: DbId,
    config: &JwtConfig,
) -> Result<IssuedRefreshToken, sqlx::Error> {
    let token = generate_refresh_token();
    let input = CreateRefreshToken {
        user_id,
        token_hash: hash_refresh_token(&token, &config.refresh_secret),
        expires_at: Utc::now() + Duration::days(config.refresh_token_expiry_days),
    };
    let record = RefreshTokenRepo::create(pool, &input).await?;
    Ok(IssuedRefreshToken { token, record })
}

/// Resolve a presented token to its stored row.
pub async fn find_by_token(
    pool: &PgPool,
    token: &str,
    config: &JwtConfig,
) -> Result<Option<RefreshToken>, sqlx::Error> {
    let token_hash = hash_refresh_token(token, &config.refresh_secret);
    RefreshTokenRepo::find_by_token_hash(pool, &token_hash).await
}

/// Return the row if it is still valid at `now`.
///
/// An expired row is deleted before [`TokenError::Expired`] is returned, so
/// stale tokens are purged on first use as well as by the janitor.
pub async fn verify_expiration(
    pool: &PgPool,
    record: RefreshToken,
    now: Timestamp,
) -> AppResult<RefreshToken> {
    if record.expires_at < now {
        RefreshTokenRepo::delete(pool, record.id).await?;
        tracing::debug!(user_id = record.user_id, "Purged expired refresh token");
        return Err(AppError::Token(TokenError::Expired));
    }
    Ok(record)
}
