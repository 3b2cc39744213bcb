//! Handlers for the caller's own account (`/users`).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use imperium_core::error::CoreError;
use imperium_core::user::{display_name, validate_email, validate_password_strength};
use imperium_db::models::user::{UpdateUser, UserResponse};
use imperium_db::repositories::{DeleteOutcome, RefreshTokenRepo, UserRepo};
use serde::Deserialize;

use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::UserEnvelope;
use crate::state::AppState;

/// Request body for `PUT /users/update`.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Request body for `PUT /users/update-password`.
#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
    pub new_password: String,
}

fn user_not_found(id: i64) -> AppError {
    AppError::Core(CoreError::NotFound { entity: "User", id })
}

/// GET /api/v1/users/me
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<UserEnvelope<UserResponse>>> {
    let user = UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| user_not_found(auth.user_id))?;
    Ok(Json(UserEnvelope {
        user: UserResponse::from(user),
    }))
}

/// PUT /api/v1/users/update
///
/// Changing the email invalidates outstanding access tokens, whose subject is
/// the old address.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<UpdateProfileRequest>,
) -> AppResult<Json<UserEnvelope<UserResponse>>> {
    let email = input.email.trim().to_string();
    validate_email(&email)?;
    let name = display_name(&input.first_name, &input.last_name)?;

    let user = UserRepo::update(&state.pool, auth.user_id, &UpdateUser { email, name })
        .await?
        .ok_or_else(|| user_not_found(auth.user_id))?;

    Ok(Json(UserEnvelope {
        user: UserResponse::from(user),
    }))
}

/// PUT /api/v1/users/update-password
///
/// Verifies the current password, stores the new hash and revokes every
/// refresh token of the user.
pub async fn update_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<UpdatePasswordRequest>,
) -> AppResult<StatusCode> {
    let user = UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| user_not_found(auth.user_id))?;

    let matches = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !matches {
        return Err(AppError::Core(CoreError::Unauthorized(
            "Current password is incorrect".into(),
        )));
    }
    validate_password_strength(&input.new_password)?;

    let new_hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let mut tx = state.pool.begin().await?;
    UserRepo::update_password(&mut *tx, user.id, &new_hash).await?;
    let revoked = RefreshTokenRepo::delete_all_for_user(&mut *tx, user.id).await?;
    tx.commit().await?;

    tracing::info!(user_id = user.id, revoked, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/users
///
/// Refused with 409 while the caller has a PENDING or ACTIVE session.
pub async fn delete(State(state): State<AppState>, auth: AuthUser) -> AppResult<StatusCode> {
    match UserRepo::delete_with_dependents(&state.pool, auth.user_id).await? {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::NotFound => Err(user_not_found(auth.user_id)),
        DeleteOutcome::HasLiveSessions => Err(AppError::Core(CoreError::Conflict(
            "User has pending or active sessions".into(),
        ))),
    }
}
