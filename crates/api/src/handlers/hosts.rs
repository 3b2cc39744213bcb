//! Handlers for the `/hosts` resource.
//!
//! All routes are scoped to hosts owned by the caller.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use imperium_core::error::CoreError;
use imperium_core::host::{validate_ip_address, validate_port, validate_registration};
use imperium_core::session::{owned_by, SessionError};
use imperium_core::status::HostStatus;
use imperium_core::types::DbId;
use imperium_db::models::host::{
    CreateHost, Host, HostResponse, UpdateHost, UpdateHostStatus,
};
use imperium_db::repositories::host_repo::StatusChange;
use imperium_db::repositories::{DeleteOutcome, HostRepo};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Load a host and check that the caller owns it.
async fn owned_host(state: &AppState, user_id: DbId, id: DbId) -> AppResult<Host> {
    let host = HostRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(SessionError::HostNotFound(id))?;
    if !owned_by(host.owner_id, user_id) {
        return Err(SessionError::HostOwnershipMismatch(id).into());
    }
    Ok(host)
}

/// POST /api/v1/hosts
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateHost>,
) -> AppResult<(StatusCode, Json<HostResponse>)> {
    validate_registration(&input.name, &input.ip_address, input.port)?;
    let host = HostRepo::create(&state.pool, auth.user_id, &input).await?;
    tracing::info!(host_id = host.id, user_id = auth.user_id, "Host created");
    Ok((StatusCode::CREATED, Json(HostResponse::from(&host))))
}

/// POST /api/v1/hosts/register
///
/// Idempotent registration by (name, ip_address, port).
pub async fn register(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateHost>,
) -> AppResult<Json<HostResponse>> {
    validate_registration(&input.name, &input.ip_address, input.port)?;
    let host = HostRepo::get_or_create(&state.pool, auth.user_id, &input).await?;
    Ok(Json(HostResponse::from(&host)))
}

/// GET /api/v1/hosts
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<HostResponse>>> {
    let hosts = HostRepo::list_by_owner(&state.pool, auth.user_id).await?;
    Ok(Json(hosts.iter().map(HostResponse::from).collect()))
}

/// GET /api/v1/hosts/{id}
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<HostResponse>> {
    let host = owned_host(&state, auth.user_id, id).await?;
    Ok(Json(HostResponse::from(&host)))
}

/// PUT /api/v1/hosts/{id}
///
/// A status change here is subject to the same guard as `PATCH .../status`.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateHost>,
) -> AppResult<Json<HostResponse>> {
    validate_ip_address(&input.ip_address)?;
    validate_port(input.port)?;
    owned_host(&state, auth.user_id, id).await?;

    let change = HostRepo::update_guarded(&state.pool, id, &input).await?;
    let host = resolve_change(id, change)?;
    Ok(Json(HostResponse::from(&host)))
}

/// PATCH /api/v1/hosts/{id}/status
///
/// Refused with 409 while the host has an ACTIVE session.
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateHostStatus>,
) -> AppResult<Json<HostResponse>> {
    owned_host(&state, auth.user_id, id).await?;

    let change = HostRepo::update_status_guarded(&state.pool, id, input.status).await?;
    let host = resolve_change(id, change)?;
    tracing::info!(host_id = id, status = %input.status, "Host status overwritten");
    Ok(Json(HostResponse::from(&host)))
}

fn resolve_change(id: DbId, change: StatusChange) -> AppResult<Host> {
    match change {
        StatusChange::Updated(host) => Ok(host),
        StatusChange::NotFound => Err(SessionError::HostNotFound(id).into()),
        StatusChange::BlockedByActiveSession => Err(AppError::Core(CoreError::Conflict(
            format!("Host {id} has an active session; its status cannot be changed"),
        ))),
    }
}

/// DELETE /api/v1/hosts/{id}
///
/// Refused with 409 while a PENDING or ACTIVE session references the host;
/// otherwise its session history is deleted with it.
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    owned_host(&state, auth.user_id, id).await?;
    match HostRepo::delete_with_history(&state.pool, id).await? {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::NotFound => Err(SessionError::HostNotFound(id).into()),
        DeleteOutcome::HasLiveSessions => Err(AppError::Core(CoreError::Conflict(format!(
            "Host {id} has pending or active sessions"
        )))),
    }
}

/// GET /api/v1/hosts/{id}/programs
///
/// Proxies the host's program list. The host must be AVAILABLE.
pub async fn programs(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<serde_json::Value>> {
    let host = owned_host(&state, auth.user_id, id).await?;
    if host.status() != HostStatus::Available {
        return Err(SessionError::HostUnavailable(id).into());
    }
    let programs = state.hosts.list_programs(&host).await?;
    Ok(Json(programs))
}
