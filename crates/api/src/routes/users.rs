use axum::routing::{delete, get, put};
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// Routes mounted at `/users`. All require auth.
///
/// ```text
/// DELETE /                -> delete
/// GET    /me              -> me
/// PUT    /update          -> update
/// PUT    /update-password -> update_password
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", delete(users::delete))
        .route("/me", get(users::me))
        .route("/update", put(users::update))
        .route("/update-password", put(users::update_password))
}
