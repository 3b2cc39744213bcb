#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

use imperium_api::auth::jwt::JwtConfig;
use imperium_api::config::ServerConfig;
use imperium_api::router::build_app_router;
use imperium_api::state::AppState;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Build a test `ServerConfig` with fixed secrets and a short host timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        host_request_timeout_secs: 2,
        session_janitor_interval_secs: 300,
        jwt: JwtConfig {
            access_secret: "test-access-secret".to_string(),
            refresh_secret: "test-refresh-secret".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
    }
}

pub fn test_state(pool: PgPool) -> AppState {
    AppState::new(pool, test_config())
}

/// Build the full application router, with the same middleware stack as
/// production.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_router(test_state(pool), &test_config())
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: &Router, uri: &str, token: &str) -> Response {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(app: &Router, uri: &str, token: &str, body: Value) -> Response {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn post_auth(app: &Router, uri: &str, token: &str) -> Response {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn put_json_auth(app: &Router, uri: &str, token: &str, body: Value) -> Response {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn patch_json_auth(app: &Router, uri: &str, token: &str, body: Value) -> Response {
    send(app, Method::PATCH, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: &Router, uri: &str, token: &str) -> Response {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the status and return the parsed body.
pub async fn expect_json(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Register and log in a user through the API. Returns the login body.
pub async fn register_and_login(app: &Router, email: &str) -> Value {
    let response = post_json(
        app,
        "/api/v1/auth/register",
        json!({
            "email": email,
            "password": TEST_PASSWORD,
            "first_name": "Test",
            "last_name": "User",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = post_json(
        app,
        "/api/v1/auth/login",
        json!({ "email": email, "password": TEST_PASSWORD }),
    )
    .await;
    expect_json(response, StatusCode::OK).await
}

/// Register a user and return an access token.
pub async fn access_token(app: &Router, email: &str) -> String {
    register_and_login(app, email).await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

pub async fn create_host(app: &Router, token: &str, name: &str, port: u16) -> Value {
    let response = post_json_auth(
        app,
        "/api/v1/hosts",
        token,
        json!({ "name": name, "ip_address": "127.0.0.1", "port": port }),
    )
    .await;
    expect_json(response, StatusCode::CREATED).await
}

pub async fn create_client(app: &Router, token: &str, name: &str) -> Value {
    let response = post_json_auth(
        app,
        "/api/v1/clients",
        token,
        json!({ "client_name": name, "ip_address": "10.0.0.2" }),
    )
    .await;
    expect_json(response, StatusCode::CREATED).await
}

pub async fn create_session(app: &Router, token: &str, host_id: i64, client_id: i64) -> Value {
    let response = post_json_auth(
        app,
        "/api/v1/sessions",
        token,
        json!({ "host_id": host_id, "client_id": client_id, "program_id": "notepad" }),
    )
    .await;
    expect_json(response, StatusCode::OK).await
}

// ---------------------------------------------------------------------------
// Stub host
// ---------------------------------------------------------------------------

/// Serve `router` on an ephemeral local port, returning the port.
pub async fn spawn_stub_host(router: Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    port
}

/// A host that accepts every start with a fixed answer, acknowledges every
/// end and lists one program.
pub async fn spawn_answering_host() -> u16 {
    use axum::routing::{get, post};
    use axum::Json;
    use imperium_core::host::{PROGRAMS_PATH, SIGNALING_END_PATH, SIGNALING_START_PATH};

    spawn_stub_host(
        Router::new()
            .route(
                SIGNALING_START_PATH,
                post(|| async { Json(json!({ "webrtc_answer": "answer-sdp" })) }),
            )
            .route(SIGNALING_END_PATH, post(|| async { StatusCode::OK }))
            .route(
                PROGRAMS_PATH,
                get(|| async { Json(json!([{ "id": "notepad", "name": "Notepad" }])) }),
            ),
    )
    .await
}

/// A host that starts sessions normally but answers every end notification
/// with a 500.
pub async fn spawn_host_failing_end() -> u16 {
    use axum::routing::post;
    use axum::Json;
    use imperium_core::host::{SIGNALING_END_PATH, SIGNALING_START_PATH};

    spawn_stub_host(
        Router::new()
            .route(
                SIGNALING_START_PATH,
                post(|| async { Json(json!({ "webrtc_answer": "answer-sdp" })) }),
            )
            .route(
                SIGNALING_END_PATH,
                post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            ),
    )
    .await
}

/// A port with nothing listening on it.
pub async fn unused_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
