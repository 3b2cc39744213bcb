//! HTTP-level integration tests for the `/hosts` and `/clients` resources.

mod common;

use axum::http::StatusCode;
use common::{
    access_token, create_client, create_host, create_session, delete_auth, expect_json,
    get_auth, patch_json_auth, post_auth, post_json_auth, put_json_auth, spawn_answering_host,
    unused_port,
};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Hosts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn created_host_is_available(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = access_token(&app, "hosts@example.com").await;

    let host = create_host(&app, &token, "rig", 9000).await;
    assert_eq!(host["name"], "rig");
    assert_eq!(host["ip_address"], "127.0.0.1");
    assert_eq!(host["port"], 9000);
    assert_eq!(host["status"], "AVAILABLE");

    let response = get_auth(&app, "/api/v1/hosts", &token).await;
    let list = expect_json(response, StatusCode::OK).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn host_registration_is_idempotent(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = access_token(&app, "register@example.com").await;
    let body = json!({ "name": "rig", "ip_address": "192.168.1.20", "port": 8080 });

    let first = expect_json(
        post_json_auth(&app, "/api/v1/hosts/register", &token, body.clone()).await,
        StatusCode::OK,
    )
    .await;
    let second = expect_json(
        post_json_auth(&app, "/api/v1/hosts/register", &token, body).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(first["id"], second["id"]);

    // The same triple under another owner is a different host.
    let other = access_token(&app, "other@example.com").await;
    let third = expect_json(
        post_json_auth(
            &app,
            "/api/v1/hosts/register",
            &other,
            json!({ "name": "rig", "ip_address": "192.168.1.20", "port": 8080 }),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_ne!(first["id"], third["id"]);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn host_validation_errors_are_bad_requests(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = access_token(&app, "invalid@example.com").await;

    for body in [
        json!({ "name": "", "ip_address": "10.0.0.1", "port": 9000 }),
        json!({ "name": "rig", "ip_address": "not-an-ip", "port": 9000 }),
        json!({ "name": "rig", "ip_address": "10.0.0.1", "port": 0 }),
        json!({ "name": "rig", "ip_address": "10.0.0.1", "port": 70000 }),
    ] {
        let response = post_json_auth(&app, "/api/v1/hosts", &token, body.clone()).await;
        let json = expect_json(response, StatusCode::BAD_REQUEST).await;
        assert_eq!(json["code"], "VALIDATION_ERROR", "{body}");
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn host_update_overwrites_address_and_status(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = access_token(&app, "update@example.com").await;
    let id = create_host(&app, &token, "rig", 9000).await["id"].as_i64().unwrap();

    let response = put_json_auth(
        &app,
        &format!("/api/v1/hosts/{id}"),
        &token,
        json!({ "ip_address": "10.0.0.9", "port": 9100, "status": "OFFLINE" }),
    )
    .await;
    let host = expect_json(response, StatusCode::OK).await;
    assert_eq!(host["ip_address"], "10.0.0.9");
    assert_eq!(host["port"], 9100);
    assert_eq!(host["status"], "OFFLINE");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn status_change_blocked_while_session_active(pool: PgPool) {
    let port = spawn_answering_host().await;
    let app = common::build_test_app(pool);
    let token = access_token(&app, "guard@example.com").await;
    let host_id = create_host(&app, &token, "rig", port).await["id"].as_i64().unwrap();
    let client_id = create_client(&app, &token, "laptop").await["id"].as_i64().unwrap();
    let session_id = create_session(&app, &token, host_id, client_id).await["id"]
        .as_i64()
        .unwrap();
    let response = post_json_auth(
        &app,
        &format!("/api/v1/sessions/{session_id}/start"),
        &token,
        json!({ "webrtc_offer": "offer-sdp" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let status_uri = format!("/api/v1/hosts/{host_id}/status");
    let response = patch_json_auth(&app, &status_uri, &token, json!({ "status": "AVAILABLE" })).await;
    let json = expect_json(response, StatusCode::CONFLICT).await;
    assert_eq!(json["code"], "CONFLICT");

    // Re-asserting the current status is a no-op, not a conflict.
    let response = patch_json_auth(&app, &status_uri, &token, json!({ "status": "INUSE" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_auth(
        &app,
        &format!("/api/v1/sessions/{session_id}/end"),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = patch_json_auth(&app, &status_uri, &token, json!({ "status": "OFFLINE" })).await;
    let host = expect_json(response, StatusCode::OK).await;
    assert_eq!(host["status"], "OFFLINE");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn host_delete_refused_with_live_session(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = access_token(&app, "delete@example.com").await;
    let host_id = create_host(&app, &token, "rig", 9000).await["id"].as_i64().unwrap();
    let client_id = create_client(&app, &token, "laptop").await["id"].as_i64().unwrap();
    let session_id = create_session(&app, &token, host_id, client_id).await["id"]
        .as_i64()
        .unwrap();

    let response = delete_auth(&app, &format!("/api/v1/hosts/{host_id}"), &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = post_auth(
        &app,
        &format!("/api/v1/sessions/{session_id}/cancel"),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = delete_auth(&app, &format!("/api/v1/hosts/{host_id}"), &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE host_id = $1")
        .bind(host_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    let response = get_auth(&app, &format!("/api/v1/hosts/{host_id}"), &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn foreign_host_is_forbidden(pool: PgPool) {
    let app = common::build_test_app(pool);
    let owner = access_token(&app, "owner@example.com").await;
    let intruder = access_token(&app, "intruder@example.com").await;
    let id = create_host(&app, &owner, "rig", 9000).await["id"].as_i64().unwrap();

    let response = get_auth(&app, &format!("/api/v1/hosts/{id}"), &intruder).await;
    let json = expect_json(response, StatusCode::FORBIDDEN).await;
    assert_eq!(json["code"], "OWNERSHIP_MISMATCH");

    let response = delete_auth(&app, &format!("/api/v1/hosts/{id}"), &intruder).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn programs_are_proxied_from_available_host(pool: PgPool) {
    let port = spawn_answering_host().await;
    let app = common::build_test_app(pool);
    let token = access_token(&app, "programs@example.com").await;
    let id = create_host(&app, &token, "rig", port).await["id"].as_i64().unwrap();

    let response = get_auth(&app, &format!("/api/v1/hosts/{id}/programs"), &token).await;
    let programs = expect_json(response, StatusCode::OK).await;
    assert_eq!(programs[0]["id"], "notepad");

    let response = patch_json_auth(
        &app,
        &format!("/api/v1/hosts/{id}/status"),
        &token,
        json!({ "status": "OFFLINE" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get_auth(&app, &format!("/api/v1/hosts/{id}/programs"), &token).await;
    let json = expect_json(response, StatusCode::CONFLICT).await;
    assert_eq!(json["code"], "HOST_UNAVAILABLE");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn programs_from_unreachable_host_is_bad_gateway(pool: PgPool) {
    let port = unused_port().await;
    let app = common::build_test_app(pool);
    let token = access_token(&app, "down@example.com").await;
    let id = create_host(&app, &token, "rig", port).await["id"].as_i64().unwrap();

    let response = get_auth(&app, &format!("/api/v1/hosts/{id}/programs"), &token).await;
    let json = expect_json(response, StatusCode::BAD_GATEWAY).await;
    assert_eq!(json["code"], "HOST_UNREACHABLE");
}

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn client_upsert_is_idempotent(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = access_token(&app, "clients@example.com").await;
    let body = json!({ "client_name": "laptop", "ip_address": "10.0.0.2" });

    let first = expect_json(
        post_json_auth(&app, "/api/v1/clients/upsert", &token, body.clone()).await,
        StatusCode::OK,
    )
    .await;
    let second = expect_json(
        post_json_auth(&app, "/api/v1/clients/upsert", &token, body).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(first["id"], second["id"]);
    assert_eq!(first["client_name"], "laptop");

    let response = get_auth(&app, "/api/v1/clients/me", &token).await;
    let list = expect_json(response, StatusCode::OK).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn client_update_and_delete(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = access_token(&app, "crud@example.com").await;
    let id = create_client(&app, &token, "laptop").await["id"].as_i64().unwrap();

    let response = put_json_auth(
        &app,
        &format!("/api/v1/clients/{id}"),
        &token,
        json!({ "client_name": "desktop", "ip_address": "10.0.0.3" }),
    )
    .await;
    let client = expect_json(response, StatusCode::OK).await;
    assert_eq!(client["client_name"], "desktop");
    assert_eq!(client["ip_address"], "10.0.0.3");

    let response = delete_auth(&app, &format!("/api/v1/clients/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get_auth(&app, &format!("/api/v1/clients/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn client_delete_refused_with_live_session(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = access_token(&app, "busyclient@example.com").await;
    let host_id = create_host(&app, &token, "rig", 9000).await["id"].as_i64().unwrap();
    let client_id = create_client(&app, &token, "laptop").await["id"].as_i64().unwrap();
    create_session(&app, &token, host_id, client_id).await;

    let response = delete_auth(&app, &format!("/api/v1/clients/{client_id}"), &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn foreign_client_is_forbidden(pool: PgPool) {
    let app = common::build_test_app(pool);
    let owner = access_token(&app, "cowner@example.com").await;
    let intruder = access_token(&app, "cintruder@example.com").await;
    let id = create_client(&app, &owner, "laptop").await["id"].as_i64().unwrap();

    let response = get_auth(&app, &format!("/api/v1/clients/{id}"), &intruder).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
