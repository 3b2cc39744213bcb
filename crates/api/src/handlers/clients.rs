//! Handlers for the `/clients` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use imperium_core::client::validate_client;
use imperium_core::error::CoreError;
use imperium_core::session::{owned_by, SessionError};
use imperium_core::types::DbId;
use imperium_db::models::client::{Client, ClientResponse, CreateClient};
use imperium_db::repositories::{ClientRepo, DeleteOutcome};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

async fn owned_client(state: &AppState, user_id: DbId, id: DbId) -> AppResult<Client> {
    let client = ClientRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(SessionError::ClientNotFound(id))?;
    if !owned_by(client.owner_id, user_id) {
        return Err(SessionError::ClientOwnershipMismatch(id).into());
    }
    Ok(client)
}

/// POST /api/v1/clients
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateClient>,
) -> AppResult<(StatusCode, Json<ClientResponse>)> {
    validate_client(&input.client_name, &input.ip_address)?;
    let client = ClientRepo::create(&state.pool, auth.user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(ClientResponse::from(&client))))
}

/// POST /api/v1/clients/upsert
///
/// Returns the caller's client with this (client_name, ip_address), creating
/// it if needed.
pub async fn upsert(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateClient>,
) -> AppResult<Json<ClientResponse>> {
    validate_client(&input.client_name, &input.ip_address)?;
    let client = ClientRepo::upsert(&state.pool, auth.user_id, &input).await?;
    Ok(Json(ClientResponse::from(&client)))
}

/// GET /api/v1/clients/me
pub async fn list_mine(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<ClientResponse>>> {
    let clients = ClientRepo::list_by_owner(&state.pool, auth.user_id).await?;
    Ok(Json(clients.iter().map(ClientResponse::from).collect()))
}

/// GET /api/v1/clients/{id}
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<ClientResponse>> {
    let client = owned_client(&state, auth.user_id, id).await?;
    Ok(Json(ClientResponse::from(&client)))
}

/// PUT /api/v1/clients/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<CreateClient>,
) -> AppResult<Json<ClientResponse>> {
    validate_client(&input.client_name, &input.ip_address)?;
    owned_client(&state, auth.user_id, id).await?;
    let client = ClientRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(SessionError::ClientNotFound(id))?;
    Ok(Json(ClientResponse::from(&client)))
}

/// DELETE /api/v1/clients/{id}
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    owned_client(&state, auth.user_id, id).await?;
    match ClientRepo::delete_with_history(&state.pool, id).await? {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::NotFound => Err(SessionError::ClientNotFound(id).into()),
        DeleteOutcome::HasLiveSessions => Err(AppError::Core(CoreError::Conflict(format!(
            "Client {id} has pending or active sessions"
        )))),
    }
}
