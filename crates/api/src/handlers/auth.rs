//! Handlers for the `/auth` resource (register, login, refresh, logout).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use imperium_core::error::CoreError;
use imperium_core::user::{display_name, validate_email, validate_password_strength};
use imperium_db::models::user::{CreateUser, UserResponse};
use imperium_db::repositories::{RefreshTokenRepo, UserRepo};
use serde::{Deserialize, Serialize};

use crate::auth::jwt::issue_access_token;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::refresh;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::UserEnvelope;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

/// Successful login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_expires_in: i64,
}

/// Successful refresh response. The refresh token itself is not rotated.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserEnvelope<UserResponse>>)> {
    let email = input.email.trim().to_string();
    validate_email(&email)?;
    validate_password_strength(&input.password)?;
    let name = display_name(&input.first_name, &input.last_name)?;

    if UserRepo::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Core(CoreError::Conflict(
            "Email is already registered".into(),
        )));
    }

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            email,
            password_hash,
            name,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            user: UserResponse::from(user),
        }),
    ))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let invalid = || AppError::Core(CoreError::Unauthorized("Invalid credentials".into()));

    let user = UserRepo::find_by_email(&state.pool, input.email.trim())
        .await?
        .ok_or_else(invalid)?;

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        return Err(invalid());
    }

    let jwt = &state.config.jwt;
    let access_token = issue_access_token(&user.email, jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
    let issued = refresh::create(&state.pool, user.id, jwt).await?;

    tracing::info!(user_id = user.id, "User logged in");
    Ok(Json(LoginResponse {
        user: UserResponse::from(user),
        access_token,
        refresh_token: issued.token,
        expires_in: jwt.access_expires_in_secs(),
        refresh_expires_in: jwt.refresh_expires_in_secs(),
    }))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a refresh token for a new access token.
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    let not_found = || AppError::Core(CoreError::Unauthorized("Refresh token not found".into()));
    let jwt = &state.config.jwt;

    let record = refresh::find_by_token(&state.pool, &input.token, jwt)
        .await?
        .ok_or_else(not_found)?;

    let record = match refresh::verify_expiration(&state.pool, record, Utc::now()).await {
        Ok(record) => record,
        Err(AppError::Token(_)) => return Err(not_found()),
        Err(e) => return Err(e),
    };

    let user = UserRepo::find_by_id(&state.pool, record.user_id)
        .await?
        .ok_or_else(not_found)?;

    let access_token = issue_access_token(&user.email, jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    Ok(Json(RefreshResponse {
        access_token,
        expires_in: jwt.access_expires_in_secs(),
    }))
}

/// POST /api/v1/auth/logout
///
/// Revoke every refresh token of the caller. Returns 204 No Content.
pub async fn logout(State(state): State<AppState>, auth_user: AuthUser) -> AppResult<StatusCode> {
    let revoked = RefreshTokenRepo::delete_all_for_user(&state.pool, auth_user.user_id).await?;
    tracing::info!(user_id = auth_user.user_id, revoked, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}
