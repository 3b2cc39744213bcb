pub mod auth;
pub mod clients;
pub mod health;
pub mod hosts;
pub mod sessions;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                      register (public)
/// /auth/login                         login (public)
/// /auth/refresh                       refresh (public)
/// /auth/logout                        logout (requires auth)
///
/// /users                              delete own account
/// /users/me                           current user
/// /users/update                       update profile (PUT)
/// /users/update-password              change password (PUT)
///
/// /hosts                              list, create
/// /hosts/register                     idempotent registration (POST)
/// /hosts/{id}                         get, update, delete
/// /hosts/{id}/status                  operator status overwrite (PATCH)
/// /hosts/{id}/programs                proxy the host's program list (GET)
///
/// /clients                            create
/// /clients/upsert                     idempotent registration (POST)
/// /clients/me                         list own clients
/// /clients/{id}                       get, update, delete
///
/// /sessions                           list own, create
/// /sessions/validate                  host-side token check (POST)
/// /sessions/host/{host_id}            sessions of an owned host
/// /sessions/client/{client_id}        sessions of an owned client
/// /sessions/{id}                      get
/// /sessions/{id}/start                start with a WebRTC offer (POST)
/// /sessions/{id}/end                  end (POST)
/// /sessions/{id}/cancel               cancel (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/hosts", hosts::router())
        .nest("/clients", clients::router())
        .nest("/sessions", sessions::router())
}
