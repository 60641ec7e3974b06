mod common;

use axum::http::StatusCode;
use common::TestApp;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn();

    let response = app.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "workshop-service");
}

#[tokio::test]
async fn readiness_check_works() {
    let app = TestApp::spawn();

    let response = app.get("/ready").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "ready");
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::spawn();

    let response = app.get("/ready").await;

    assert!(response.headers.get("x-request-id").is_some());
}

#[tokio::test]
async fn metrics_are_exposed_as_text() {
    let app = TestApp::spawn();
    app.get("/health").await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    let content_type = response.headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
    let text = String::from_utf8(response.bytes).unwrap();
    assert!(text.contains("workshop_http_requests_total"));
}
