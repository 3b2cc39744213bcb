//! Handlers for the `/sessions` resource.
//!
//! Thin adapters over [`SessionCoordinator`](crate::sessions::SessionCoordinator);
//! the authenticated user id is passed to every operation.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use imperium_core::error::CoreError;
use imperium_core::types::DbId;
use imperium_db::models::session::{
    CreateSessionRequest, EndSessionRequest, SessionResponse, SessionSummary,
    StartSessionRequest,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Query string of `POST /sessions/{id}/cancel`.
#[derive(Debug, Deserialize)]
pub struct CancelParams {
    pub reason: Option<String>,
}

/// Query string of `POST /sessions/validate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateParams {
    pub session_token: String,
    pub host_id: DbId,
}

/// POST /api/v1/sessions
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateSessionRequest>,
) -> AppResult<Json<SessionResponse>> {
    let session = state.sessions.create_session(auth.user_id, &input).await?;
    Ok(Json(session))
}

/// POST /api/v1/sessions/{id}/start
pub async fn start(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<StartSessionRequest>,
) -> AppResult<Json<SessionResponse>> {
    if input.webrtc_offer.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "WebRTC offer cannot be blank".into(),
        )));
    }
    let session = state
        .sessions
        .start_session(auth.user_id, id, &input.webrtc_offer)
        .await?;
    Ok(Json(session))
}

/// POST /api/v1/sessions/{id}/end
///
/// The body is optional; both of its fields are.
pub async fn end(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    input: Option<Json<EndSessionRequest>>,
) -> AppResult<Json<SessionResponse>> {
    let input = input.map(|Json(body)| body).unwrap_or_default();
    let session = state
        .sessions
        .end_session(
            auth.user_id,
            id,
            input.reason.as_deref(),
            input.webrtc_answer.as_deref(),
        )
        .await?;
    Ok(Json(session))
}

/// POST /api/v1/sessions/{id}/cancel?reason=
pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Query(params): Query<CancelParams>,
) -> AppResult<Json<SessionResponse>> {
    let session = state
        .sessions
        .cancel_session(auth.user_id, id, params.reason.as_deref())
        .await?;
    Ok(Json(session))
}

/// GET /api/v1/sessions/{id}
pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<SessionResponse>> {
    Ok(Json(state.sessions.get_session(auth.user_id, id).await?))
}

/// GET /api/v1/sessions
pub async fn list_mine(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<SessionSummary>>> {
    Ok(Json(state.sessions.list_for_user(auth.user_id).await?))
}

/// GET /api/v1/sessions/host/{host_id}
pub async fn list_for_host(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(host_id): Path<DbId>,
) -> AppResult<Json<Vec<SessionSummary>>> {
    Ok(Json(
        state.sessions.list_for_host(auth.user_id, host_id).await?,
    ))
}

/// GET /api/v1/sessions/client/{client_id}
pub async fn list_for_client(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(client_id): Path<DbId>,
) -> AppResult<Json<Vec<SessionSummary>>> {
    Ok(Json(
        state.sessions.list_for_client(auth.user_id, client_id).await?,
    ))
}

/// POST /api/v1/sessions/validate?sessionToken=&hostId=
///
/// Called by hosts to authorize an inbound signaling call. Answers `false`
/// for any miss rather than failing, including a missing or non-numeric
/// `hostId`.
pub async fn validate(
    State(state): State<AppState>,
    _auth: AuthUser,
    params: Result<Query<ValidateParams>, QueryRejection>,
) -> Json<bool> {
    let Ok(Query(params)) = params else {
        return Json(false);
    };
    Json(
        state
            .sessions
            .validate_session_token(&params.session_token, params.host_id)
            .await,
    )
}
