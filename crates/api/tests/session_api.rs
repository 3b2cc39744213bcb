//! HTTP-level integration tests for the session lifecycle, host status
//! coupling and the expiry sweep.
//!
//! Hosts are local axum stubs bound to ephemeral ports.

mod common;

use axum::http::StatusCode;
use axum::Router;
use common::{
    access_token, create_client, create_host, create_session, expect_json, get_auth,
    post_auth, post_json_auth, spawn_answering_host, spawn_host_failing_end, unused_port,
};
use imperium_api::background::session_janitor;
use imperium_api::router::build_app_router;
use imperium_core::types::DbId;
use serde_json::{json, Value};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Fixture {
    app: Router,
    token: String,
    host_id: DbId,
    client_id: DbId,
}

/// One user with one host listening on `host_port` and one client.
async fn fixture(app: Router, host_port: u16) -> Fixture {
    let token = access_token(&app, "owner@example.com").await;
    let host = create_host(&app, &token, "rig", host_port).await;
    let client = create_client(&app, &token, "laptop").await;
    Fixture {
        host_id: host["id"].as_i64().unwrap(),
        client_id: client["id"].as_i64().unwrap(),
        app,
        token,
    }
}

impl Fixture {
    async fn new_session(&self) -> Value {
        create_session(&self.app, &self.token, self.host_id, self.client_id).await
    }

    async fn start(&self, session_id: i64) -> axum::response::Response {
        post_json_auth(
            &self.app,
            &format!("/api/v1/sessions/{session_id}/start"),
            &self.token,
            json!({ "webrtc_offer": "offer-sdp" }),
        )
        .await
    }

    async fn session(&self, session_id: i64) -> Value {
        let response = get_auth(
            &self.app,
            &format!("/api/v1/sessions/{session_id}"),
            &self.token,
        )
        .await;
        expect_json(response, StatusCode::OK).await
    }

    async fn host_status(&self) -> String {
        let response = get_auth(
            &self.app,
            &format!("/api/v1/hosts/{}", self.host_id),
            &self.token,
        )
        .await;
        let json = expect_json(response, StatusCode::OK).await;
        json["status"].as_str().unwrap().to_string()
    }

    async fn validate(&self, session_token: &str, host_id: DbId) -> bool {
        let response = post_auth(
            &self.app,
            &format!("/api/v1/sessions/validate?sessionToken={session_token}&hostId={host_id}"),
            &self.token,
        )
        .await;
        expect_json(response, StatusCode::OK).await.as_bool().unwrap()
    }
}

async fn backdate_expiry(pool: &PgPool, session_id: i64) {
    sqlx::query("UPDATE sessions SET expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn create_start_end_round_trip(pool: PgPool) {
    let port = spawn_answering_host().await;
    let f = fixture(common::build_test_app(pool), port).await;

    let created = f.new_session().await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["status"], "PENDING");
    assert_eq!(created["host_name"], "rig");
    assert_eq!(created["client_name"], "laptop");
    assert_eq!(created["program_id"], "notepad");
    assert!(created["session_token"].as_str().unwrap().starts_with("session_"));
    assert_eq!(f.host_status().await, "AVAILABLE");

    let started = expect_json(f.start(id).await, StatusCode::OK).await;
    assert_eq!(started["status"], "ACTIVE");
    assert_eq!(started["webrtc_offer"], "offer-sdp");
    assert_eq!(started["webrtc_answer"], "answer-sdp");
    assert!(started["started_at"].is_string());
    assert_eq!(f.host_status().await, "INUSE");

    let token = started["session_token"].as_str().unwrap().to_string();
    assert!(f.validate(&token, f.host_id).await);
    assert!(!f.validate(&token, f.host_id + 1).await);

    let response = post_json_auth(
        &f.app,
        &format!("/api/v1/sessions/{id}/end"),
        &f.token,
        json!({ "reason": "done" }),
    )
    .await;
    let ended = expect_json(response, StatusCode::OK).await;
    assert_eq!(ended["status"], "ENDED");
    assert_eq!(ended["end_reason"], "done");
    assert!(ended["ended_at"].is_string());
    assert_eq!(f.host_status().await, "AVAILABLE");
    assert!(!f.validate(&token, f.host_id).await);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn end_accepts_missing_body(pool: PgPool) {
    let port = spawn_answering_host().await;
    let f = fixture(common::build_test_app(pool), port).await;
    let id = f.new_session().await["id"].as_i64().unwrap();
    expect_json(f.start(id).await, StatusCode::OK).await;

    let response = post_auth(&f.app, &format!("/api/v1/sessions/{id}/end"), &f.token).await;
    let ended = expect_json(response, StatusCode::OK).await;
    assert_eq!(ended["status"], "ENDED");
    assert!(ended["end_reason"].is_null());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn end_of_pending_session_is_invalid_state(pool: PgPool) {
    let port = spawn_answering_host().await;
    let f = fixture(common::build_test_app(pool), port).await;
    let id = f.new_session().await["id"].as_i64().unwrap();

    let response = post_auth(&f.app, &format!("/api/v1/sessions/{id}/end"), &f.token).await;
    let json = expect_json(response, StatusCode::CONFLICT).await;
    assert_eq!(json["code"], "INVALID_STATE");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn start_rejects_blank_offer(pool: PgPool) {
    let port = spawn_answering_host().await;
    let f = fixture(common::build_test_app(pool), port).await;
    let id = f.new_session().await["id"].as_i64().unwrap();

    let response = post_json_auth(
        &f.app,
        &format!("/api/v1/sessions/{id}/start"),
        &f.token,
        json!({ "webrtc_offer": "  " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(f.session(id).await["status"], "PENDING");
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn cancel_pending_uses_default_reason(pool: PgPool) {
    let port = spawn_answering_host().await;
    let f = fixture(common::build_test_app(pool), port).await;
    let id = f.new_session().await["id"].as_i64().unwrap();

    let response = post_auth(&f.app, &format!("/api/v1/sessions/{id}/cancel"), &f.token).await;
    let cancelled = expect_json(response, StatusCode::OK).await;
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(cancelled["end_reason"], "Cancelled by user");

    let response = post_auth(&f.app, &format!("/api/v1/sessions/{id}/cancel"), &f.token).await;
    let json = expect_json(response, StatusCode::CONFLICT).await;
    assert_eq!(json["code"], "ALREADY_TERMINAL");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn cancel_active_releases_host(pool: PgPool) {
    let port = spawn_answering_host().await;
    let f = fixture(common::build_test_app(pool), port).await;
    let id = f.new_session().await["id"].as_i64().unwrap();
    expect_json(f.start(id).await, StatusCode::OK).await;
    assert_eq!(f.host_status().await, "INUSE");

    let response = post_auth(
        &f.app,
        &format!("/api/v1/sessions/{id}/cancel?reason=user%20left"),
        &f.token,
    )
    .await;
    let cancelled = expect_json(response, StatusCode::OK).await;
    assert_eq!(cancelled["end_reason"], "user left");
    assert_eq!(f.host_status().await, "AVAILABLE");
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn unreachable_host_cancels_session_and_leaves_host_alone(pool: PgPool) {
    let port = unused_port().await;
    let f = fixture(common::build_test_app(pool), port).await;
    let id = f.new_session().await["id"].as_i64().unwrap();

    let json = expect_json(f.start(id).await, StatusCode::BAD_GATEWAY).await;
    assert_eq!(json["code"], "SESSION_START_FAILED");

    let session = f.session(id).await;
    assert_eq!(session["status"], "CANCELLED");
    assert!(session["end_reason"]
        .as_str()
        .unwrap()
        .starts_with("Failed to start session: "));
    assert_eq!(f.host_status().await, "AVAILABLE");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn host_without_answer_cancels_session(pool: PgPool) {
    use axum::routing::post;
    use imperium_core::host::SIGNALING_START_PATH;

    let port = common::spawn_stub_host(Router::new().route(
        SIGNALING_START_PATH,
        post(|| async { axum::Json(json!({ "status": "ok" })) }),
    ))
    .await;
    let f = fixture(common::build_test_app(pool), port).await;
    let id = f.new_session().await["id"].as_i64().unwrap();

    let json = expect_json(f.start(id).await, StatusCode::BAD_GATEWAY).await;
    assert_eq!(json["code"], "SESSION_START_FAILED");
    assert_eq!(f.session(id).await["status"], "CANCELLED");
    assert_eq!(f.host_status().await, "AVAILABLE");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn end_frees_host_when_end_notification_fails(pool: PgPool) {
    let port = spawn_host_failing_end().await;
    let f = fixture(common::build_test_app(pool), port).await;
    let id = f.new_session().await["id"].as_i64().unwrap();
    expect_json(f.start(id).await, StatusCode::OK).await;
    assert_eq!(f.host_status().await, "INUSE");

    let response = post_auth(&f.app, &format!("/api/v1/sessions/{id}/end"), &f.token).await;
    let ended = expect_json(response, StatusCode::OK).await;
    assert_eq!(ended["status"], "ENDED");
    assert_eq!(f.host_status().await, "AVAILABLE");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn cancel_frees_host_when_end_notification_fails(pool: PgPool) {
    let port = spawn_host_failing_end().await;
    let f = fixture(common::build_test_app(pool), port).await;
    let id = f.new_session().await["id"].as_i64().unwrap();
    expect_json(f.start(id).await, StatusCode::OK).await;

    let response = post_auth(&f.app, &format!("/api/v1/sessions/{id}/cancel"), &f.token).await;
    let cancelled = expect_json(response, StatusCode::OK).await;
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(f.host_status().await, "AVAILABLE");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn validate_answers_false_for_malformed_query(pool: PgPool) {
    let port = spawn_answering_host().await;
    let f = fixture(common::build_test_app(pool), port).await;

    for uri in [
        "/api/v1/sessions/validate",
        "/api/v1/sessions/validate?sessionToken=session_abc",
        "/api/v1/sessions/validate?sessionToken=session_abc&hostId=rig",
    ] {
        let response = post_auth(&f.app, uri, &f.token).await;
        let answer = expect_json(response, StatusCode::OK).await;
        assert_eq!(answer, Value::Bool(false), "{uri}");
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn expired_session_cannot_start(pool: PgPool) {
    let port = spawn_answering_host().await;
    let f = fixture(common::build_test_app(pool.clone()), port).await;
    let id = f.new_session().await["id"].as_i64().unwrap();
    backdate_expiry(&pool, id).await;

    let json = expect_json(f.start(id).await, StatusCode::GONE).await;
    assert_eq!(json["code"], "SESSION_EXPIRED");

    let session = f.session(id).await;
    assert_eq!(session["status"], "CANCELLED");
    assert_eq!(session["end_reason"], "Session expired before starting");
    assert_eq!(f.host_status().await, "AVAILABLE");
}

// ---------------------------------------------------------------------------
// Host contention
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn busy_host_rejects_second_start(pool: PgPool) {
    let port = spawn_answering_host().await;
    let f = fixture(common::build_test_app(pool.clone()), port).await;
    let first = f.new_session().await["id"].as_i64().unwrap();
    let second = f.new_session().await["id"].as_i64().unwrap();

    expect_json(f.start(first).await, StatusCode::OK).await;

    let json = expect_json(f.start(second).await, StatusCode::CONFLICT).await;
    assert_eq!(json["code"], "HOST_UNAVAILABLE");

    // Even with the status forced back, the ACTIVE session still blocks.
    sqlx::query("UPDATE hosts SET status_id = 1 WHERE id = $1")
        .bind(f.host_id)
        .execute(&pool)
        .await
        .unwrap();
    let json = expect_json(f.start(second).await, StatusCode::CONFLICT).await;
    assert_eq!(json["code"], "HOST_BUSY");
    assert_eq!(f.session(second).await["status"], "PENDING");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn create_on_host_in_use_is_rejected(pool: PgPool) {
    let port = spawn_answering_host().await;
    let f = fixture(common::build_test_app(pool), port).await;
    let id = f.new_session().await["id"].as_i64().unwrap();
    expect_json(f.start(id).await, StatusCode::OK).await;

    let response = post_json_auth(
        &f.app,
        "/api/v1/sessions",
        &f.token,
        json!({ "host_id": f.host_id, "client_id": f.client_id }),
    )
    .await;
    let json = expect_json(response, StatusCode::CONFLICT).await;
    assert_eq!(json["code"], "HOST_UNAVAILABLE");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn concurrent_starts_activate_at_most_one_session(pool: PgPool) {
    let port = spawn_answering_host().await;
    let f = fixture(common::build_test_app(pool.clone()), port).await;
    let first = f.new_session().await["id"].as_i64().unwrap();
    let second = f.new_session().await["id"].as_i64().unwrap();

    let (a, b) = tokio::join!(f.start(first), f.start(second));
    let statuses = [a.status(), b.status()];
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::OK).count(),
        1,
        "exactly one start may win: {statuses:?}"
    );
    assert!(statuses
        .iter()
        .any(|s| *s == StatusCode::CONFLICT));

    let (active,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE host_id = $1 AND status_id = 2")
            .bind(f.host_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(active, 1);
    assert_eq!(f.host_status().await, "INUSE");
}

// ---------------------------------------------------------------------------
// Ownership and listings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn other_users_cannot_touch_session(pool: PgPool) {
    let port = spawn_answering_host().await;
    let f = fixture(common::build_test_app(pool), port).await;
    let id = f.new_session().await["id"].as_i64().unwrap();
    let intruder = access_token(&f.app, "intruder@example.com").await;

    let response = get_auth(&f.app, &format!("/api/v1/sessions/{id}"), &intruder).await;
    let json = expect_json(response, StatusCode::FORBIDDEN).await;
    assert_eq!(json["code"], "OWNERSHIP_MISMATCH");

    let response = post_auth(&f.app, &format!("/api/v1/sessions/{id}/cancel"), &intruder).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let own_client = create_client(&f.app, &intruder, "tablet").await;
    let response = post_json_auth(
        &f.app,
        "/api/v1/sessions",
        &intruder,
        json!({ "host_id": f.host_id, "client_id": own_client["id"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = get_auth(
        &f.app,
        &format!("/api/v1/sessions/host/{}", f.host_id),
        &intruder,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn missing_session_is_not_found(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = access_token(&app, "nobody@example.com").await;

    let response = get_auth(&app, "/api/v1/sessions/999999", &token).await;
    let json = expect_json(response, StatusCode::NOT_FOUND).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn listings_are_newest_first(pool: PgPool) {
    let port = spawn_answering_host().await;
    let f = fixture(common::build_test_app(pool), port).await;
    let older = f.new_session().await["id"].as_i64().unwrap();
    let newer = f.new_session().await["id"].as_i64().unwrap();

    for uri in [
        "/api/v1/sessions".to_string(),
        format!("/api/v1/sessions/host/{}", f.host_id),
        format!("/api/v1/sessions/client/{}", f.client_id),
    ] {
        let response = get_auth(&f.app, &uri, &f.token).await;
        let json = expect_json(response, StatusCode::OK).await;
        let ids: Vec<i64> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![newer, older], "{uri}");
        assert_eq!(json[0]["host_name"], "rig");
        assert_eq!(json[0]["status"], "PENDING");
    }
}

// ---------------------------------------------------------------------------
// Expiry sweep
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn sweep_expires_stale_sessions_and_frees_host(pool: PgPool) {
    let port = spawn_answering_host().await;
    let state = common::test_state(pool.clone());
    let app = build_app_router(state.clone(), &common::test_config());
    let f = fixture(app, port).await;

    let active = f.new_session().await["id"].as_i64().unwrap();
    let pending = f.new_session().await["id"].as_i64().unwrap();
    let fresh = f.new_session().await["id"].as_i64().unwrap();
    expect_json(f.start(active).await, StatusCode::OK).await;
    backdate_expiry(&pool, active).await;
    backdate_expiry(&pool, pending).await;

    let report = session_janitor::sweep(&pool, &state.sessions).await;
    assert_eq!(report.sessions_expired, 2);

    for id in [active, pending] {
        let session = f.session(id).await;
        assert_eq!(session["status"], "CANCELLED");
        assert_eq!(session["end_reason"], "Session expired");
    }
    assert_eq!(f.session(fresh).await["status"], "PENDING");
    assert_eq!(f.host_status().await, "AVAILABLE");

    let again = session_janitor::sweep(&pool, &state.sessions).await;
    assert_eq!(again.sessions_expired, 0);
}
