//! Shared application router builder, used by `main.rs` and by the
//! integration tests so both run the same middleware stack.

use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Headroom between the host call timeout and the request timeout.
const HOST_CALL_MARGIN_SECS: u64 = 5;

/// Build the application [`Router`]: `/health` at the root, the API under
/// `/api/v1`.
///
/// Layers are added innermost first, so a request passes through CORS,
/// request-id assignment, tracing, request-id propagation, the request
/// timeout and panic recovery, in that order.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout(config),
        ))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(build_cors_layer(config))
        .with_state(state)
}

/// Effective per-request timeout.
///
/// `POST /sessions/{id}/start` stays open for the whole host call, so the
/// request timeout is raised to cover the host timeout plus a margin.
pub fn request_timeout(config: &ServerConfig) -> Duration {
    let floor = config.host_request_timeout_secs + HOST_CALL_MARGIN_SECS;
    if config.request_timeout_secs < floor {
        tracing::warn!(
            configured = config.request_timeout_secs,
            effective = floor,
            "REQUEST_TIMEOUT_SECS is shorter than a host call; raising it"
        );
        return Duration::from_secs(floor);
    }
    Duration::from_secs(config.request_timeout_secs)
}

/// CORS for the configured browser origins.
///
/// Credentials travel in the `Authorization` header, never in cookies, so
/// credentialed CORS is not enabled. Panics at startup on an invalid origin.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{origin}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .max_age(Duration::from_secs(3600))
}
