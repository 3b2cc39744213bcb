//! Route definitions for the `/clients` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::clients;
use crate::state::AppState;

/// Routes mounted at `/clients`.
///
/// ```text
/// POST   /        -> create
/// POST   /upsert  -> upsert
/// GET    /me      -> list_mine
/// GET    /{id}    -> get
/// PUT    /{id}    -> update
/// DELETE /{id}    -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(clients::create))
        .route("/upsert", post(clients::upsert))
        .route("/me", get(clients::list_mine))
        .route(
            "/{id}",
            get(clients::get).put(clients::update).delete(clients::delete),
        )
}
