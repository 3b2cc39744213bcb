//! Route definitions for the `/hosts` resource.

use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::hosts;
use crate::state::AppState;

/// Routes mounted at `/hosts`.
///
/// ```text
/// GET    /               -> list
/// POST   /               -> create
/// POST   /register       -> register
/// GET    /{id}           -> get
/// PUT    /{id}           -> update
/// DELETE /{id}           -> delete
/// PATCH  /{id}/status    -> update_status
/// GET    /{id}/programs  -> programs
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(hosts::list).post(hosts::create))
        .route("/register", post(hosts::register))
        .route(
            "/{id}",
            get(hosts::get).put(hosts::update).delete(hosts::delete),
        )
        .route("/{id}/status", patch(hosts::update_status))
        .route("/{id}/programs", get(hosts::programs))
}
