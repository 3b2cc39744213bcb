//! Route definitions for the `/sessions` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Routes mounted at `/sessions`.
///
/// ```text
/// GET  /                      -> list_mine
/// POST /                      -> create
/// POST /validate              -> validate
/// GET  /host/{host_id}        -> list_for_host
/// GET  /client/{client_id}    -> list_for_client
/// GET  /{id}                  -> get
/// POST /{id}/start            -> start
/// POST /{id}/end              -> end
/// POST /{id}/cancel           -> cancel
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(sessions::list_mine).post(sessions::create))
        .route("/validate", post(sessions::validate))
        .route("/host/{host_id}", get(sessions::list_for_host))
        .route("/client/{client_id}", get(sessions::list_for_client))
        .route("/{id}", get(sessions::get))
        .route("/{id}/start", post(sessions::start))
        .route("/{id}/end", post(sessions::end))
        .route("/{id}/cancel", post(sessions::cancel))
}
