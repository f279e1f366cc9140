//! Health, readiness, metrics and OpenAPI endpoint tests.

mod common;

use axum::http::StatusCode;
use common::{body_json, face_a, login_body, TestApp};

#[tokio::test]
async fn health_check_returns_200() {
    let app = TestApp::spawn();

    let res = app.get("/health").await;

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "face-auth-service-test");
    assert_eq!(body["environment"], "dev");
    assert_eq!(body["encoder"], "mock");
    assert_eq!(body["checks"]["mongodb"], "up");
}

#[tokio::test]
async fn health_check_returns_503_when_store_is_down() {
    let app = TestApp::spawn();
    app.store.set_unavailable(true);

    let res = app.get("/health").await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(res).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["mongodb"], "down");
    assert!(body["error"].as_str().unwrap().contains("Mock user store unavailable"));

    assert_eq!(app.get("/ready").await.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn readiness_returns_200() {
    let app = TestApp::spawn();
    assert_eq!(app.get("/ready").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestApp::spawn();
    let res = app.get("/health").await;

    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert_eq!(res.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn metrics_endpoint_exposes_attempt_counter() {
    face_auth_service::services::init_metrics();
    let app = TestApp::spawn();
    app.post_json("/login", login_body("nobody@example.com", face_a())).await;

    let res = app.get("/metrics").await;
    assert_eq!(res.status(), StatusCode::OK);

    let bytes = http_body_util::BodyExt::collect(res.into_body())
        .await
        .unwrap()
        .to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("face_auth_attempts_total"));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::spawn();
    let res = app.get("/.well-known/openapi.json").await;

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert!(body["paths"]["/signup"].is_object());
    assert!(body["paths"]["/login"].is_object());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = TestApp::spawn();
    assert_eq!(app.get("/nope").await.status(), StatusCode::NOT_FOUND);
}
