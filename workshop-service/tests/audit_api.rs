mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn recorded_events_carry_actor_and_context() {
    let app = TestApp::spawn();
    let user_id = Uuid::new_v4();

    let response = app
        .post(
            "/api/admin/audit-logs",
            json!({
                "entityType": "user",
                "entityId": user_id,
                "action": "updated",
                "summary": "Rôle modifié",
                "changes": [{ "field": "role", "previousValue": "client", "newValue": "professional" }]
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let log = response.json();
    assert_eq!(log["actorId"], common::ADMIN_ID);
    assert_eq!(log["actorRole"], "admin");
    assert_eq!(log["actorName"], common::ADMIN_NAME);
    assert_eq!(log["ipAddress"], "203.0.113.7");
    assert_eq!(log["userAgent"], "atelier-tests");

    let listed = app
        .get("/api/admin/audit-logs?entityType=user&action=updated")
        .await
        .json();
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["logs"][0]["entityId"], user_id.to_string());
    assert_eq!(listed["logs"][0]["changes"][0]["newValue"], "professional");
}

#[tokio::test]
async fn listing_is_newest_first_and_paged() {
    let app = TestApp::spawn();
    for _ in 0..3 {
        app.create_quote("100").await;
    }

    let page = app
        .get("/api/admin/audit-logs?entityType=quote&limit=2&offset=0")
        .await
        .json();
    assert_eq!(page["total"], 3);
    assert_eq!(page["limit"], 2);
    let logs = page["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 2);

    let rest = app
        .get("/api/admin/audit-logs?entityType=quote&limit=2&offset=2")
        .await
        .json();
    assert_eq!(rest["logs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn limit_is_clamped() {
    let app = TestApp::spawn();

    let high = app.get("/api/admin/audit-logs?limit=5000").await.json();
    assert_eq!(high["limit"], 200);

    let low = app.get("/api/admin/audit-logs?limit=0&offset=-4").await.json();
    assert_eq!(low["limit"], 1);
    assert_eq!(low["offset"], 0);
}

#[tokio::test]
async fn unknown_filter_values_are_rejected() {
    let app = TestApp::spawn();

    let response = app.get("/api/admin/audit-logs?entityType=spaceship").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app.get("/api/admin/audit-logs?action=exploded").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn item_changes_are_audited_on_the_parent_document() {
    let app = TestApp::spawn();
    let quote = app.create_quote("0").await;
    let quote_id = quote["id"].as_str().unwrap();

    let item = app
        .post(
            &format!("/api/admin/quotes/{}/items", quote_id),
            json!({ "description": "Centrage", "quantity": 4, "unitPriceExcludingTax": 8 }),
        )
        .await
        .json();

    let logs = app
        .get(&format!(
            "/api/admin/audit-logs?entityType=quote&entityId={}",
            quote_id
        ))
        .await
        .json();
    let latest = &logs["logs"][0];
    assert_eq!(latest["action"], "updated");
    assert_eq!(latest["metadata"]["itemId"], item["id"]);
    assert_eq!(latest["metadata"]["operation"], "item_added");
    assert!(!latest["changes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_actor_id_is_rejected() {
    let app = TestApp::spawn();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/admin/audit-logs")
        .header("x-user-id", "not-a-uuid")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            json!({ "entityType": "user", "entityId": Uuid::new_v4(), "action": "deleted" })
                .to_string(),
        ))
        .unwrap();

    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
