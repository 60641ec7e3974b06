mod common;

use axum::http::StatusCode;
use common::{d, dec, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn create_quote_assigns_reference_and_totals() {
    let app = TestApp::spawn();

    let quote = app.create_quote("480").await;

    assert!(quote["reference"].as_str().unwrap().starts_with("DEV-"));
    assert_eq!(quote["status"], "pending");
    assert_eq!(dec(&quote["taxRate"]), d("20"));
    assert_eq!(dec(&quote["taxAmount"]), d("96.00"));
    assert_eq!(dec(&quote["quoteAmount"]), d("576.00"));
}

#[tokio::test]
async fn quote_references_are_sequential() {
    let app = TestApp::spawn();

    let first = app.create_quote("100").await;
    let second = app.create_quote("100").await;

    let first = first["reference"].as_str().unwrap().to_string();
    let second = second["reference"].as_str().unwrap().to_string();
    assert!(first.ends_with("-00001"), "{}", first);
    assert!(second.ends_with("-00002"), "{}", second);
}

#[tokio::test]
async fn create_quote_for_unknown_client_is_404() {
    let app = TestApp::spawn();

    let response = app
        .post(
            "/api/admin/quotes",
            json!({ "clientId": Uuid::new_v4(), "priceExcludingTax": 100 }),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn item_mutations_recompute_totals() {
    let app = TestApp::spawn();
    let quote = app.create_quote("0").await;
    let quote_id = quote["id"].as_str().unwrap();

    let response = app
        .post(
            &format!("/api/admin/quotes/{}/items", quote_id),
            json!({
                "description": "Microbillage",
                "quantity": "2",
                "unitPriceExcludingTax": "45,50",
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let item = response.json();
    assert_eq!(dec(&item["totalExcludingTax"]), d("91.00"));
    assert_eq!(dec(&item["taxAmount"]), d("18.20"));
    assert_eq!(dec(&item["totalIncludingTax"]), d("109.20"));

    let item_id = item["id"].as_str().unwrap();
    let response = app
        .patch(
            &format!("/api/admin/quote-items/{}", item_id),
            json!({ "quantity": 4, "taxRate": "5.5" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let updated = response.json();
    assert_eq!(updated["description"], "Microbillage");
    assert_eq!(dec(&updated["totalExcludingTax"]), d("182.00"));
    assert_eq!(dec(&updated["taxAmount"]), d("10.01"));
    assert_eq!(dec(&updated["totalIncludingTax"]), d("192.01"));

    let response = app.delete(&format!("/api/admin/quote-items/{}", item_id)).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let items = app.get(&format!("/api/admin/quotes/{}/items", quote_id)).await.json();
    assert_eq!(items.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn items_are_listed_by_position() {
    let app = TestApp::spawn();
    let quote = app.create_quote("0").await;
    let uri = format!("/api/admin/quotes/{}/items", quote["id"].as_str().unwrap());

    for (description, position) in [("Vernis", 2), ("Décapage", 0), ("Peinture", 1)] {
        let response = app
            .post(
                &uri,
                json!({
                    "description": description,
                    "quantity": 1,
                    "unitPriceExcludingTax": 10,
                    "position": position,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let items = app.get(&uri).await.json();
    let descriptions: Vec<_> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["description"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(descriptions, vec!["Décapage", "Peinture", "Vernis"]);
}

#[tokio::test]
async fn item_with_missing_fields_is_rejected() {
    let app = TestApp::spawn();
    let quote = app.create_quote("0").await;

    let response = app
        .post(
            &format!("/api/admin/quotes/{}/items", quote["id"].as_str().unwrap()),
            json!({ "description": "Sans prix", "quantity": 1 }),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn item_with_negative_quantity_is_rejected() {
    let app = TestApp::spawn();
    let quote = app.create_quote("0").await;

    let response = app
        .post(
            &format!("/api/admin/quotes/{}/items", quote["id"].as_str().unwrap()),
            json!({ "description": "Remise", "quantity": -1, "unitPriceExcludingTax": 10 }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_item_amounts_are_rejected() {
    let app = TestApp::spawn();
    let quote = app.create_quote("0").await;
    let items_uri = format!("/api/admin/quotes/{}/items", quote["id"].as_str().unwrap());

    let response = app
        .post(
            &items_uri,
            json!({ "description": "Jante", "quantity": "1e20", "unitPriceExcludingTax": "1e20" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .post(
            &items_uri,
            json!({ "description": "Jante", "quantity": 1, "unitPriceExcludingTax": 10, "taxRate": 250 }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let item = app
        .post(
            &items_uri,
            json!({ "description": "Jante", "quantity": 4, "unitPriceExcludingTax": 120 }),
        )
        .await
        .json();
    let response = app
        .patch(
            &format!("/api/admin/quote-items/{}", item["id"].as_str().unwrap()),
            json!({ "unitPriceExcludingTax": "99999999999" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .post(
            "/api/admin/quotes",
            json!({ "clientId": app.client.id, "priceExcludingTax": "1e25" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let listed = app.get(&items_uri).await.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invoice_cannot_reuse_another_clients_quote() {
    let app = TestApp::spawn();
    let other = app.seed_other_client();
    let quote = app.create_quote("480").await;

    let response = app
        .post(
            "/api/admin/invoices",
            json!({ "clientId": other.id, "quoteId": quote["id"] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let logs = app
        .get("/api/admin/audit-logs?entityType=invoice")
        .await
        .json();
    assert_eq!(logs["total"], 0);
}

#[tokio::test]
async fn client_bundle_is_limited_to_its_owner() {
    let app = TestApp::spawn();
    let other = app.seed_other_client();
    let quote = app.create_quote("480").await;
    let uri = format!("/api/quotes/{}/pdf", quote["id"].as_str().unwrap());

    let own = app.get_as_client(&uri, app.client.id).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.json()["client"]["id"], app.client.id.to_string());

    let foreign = app.get_as_client(&uri, other.id).await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);

    let admin = app
        .get(&format!("/api/admin/quotes/{}/pdf", quote["id"].as_str().unwrap()))
        .await;
    assert_eq!(admin.status, StatusCode::OK);
}

#[tokio::test]
async fn nested_delete_requires_matching_document() {
    let app = TestApp::spawn();
    let first = app.create_quote("0").await;
    let second = app.create_quote("0").await;

    let item = app
        .post(
            &format!("/api/admin/quotes/{}/items", first["id"].as_str().unwrap()),
            json!({ "description": "Valve", "quantity": 4, "unitPriceExcludingTax": 3 }),
        )
        .await
        .json();
    let item_id = item["id"].as_str().unwrap();

    let wrong = app
        .delete(&format!(
            "/api/admin/quotes/{}/items/{}",
            second["id"].as_str().unwrap(),
            item_id
        ))
        .await;
    assert_eq!(wrong.status, StatusCode::NOT_FOUND);

    let right = app
        .delete(&format!(
            "/api/admin/quotes/{}/items/{}",
            first["id"].as_str().unwrap(),
            item_id
        ))
        .await;
    assert_eq!(right.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn invoice_from_quote_copies_items() {
    let app = TestApp::spawn();
    let quote = app.create_quote("0").await;
    let quote_id = quote["id"].as_str().unwrap();
    app.post(
        &format!("/api/admin/quotes/{}/items", quote_id),
        json!({ "description": "Peinture", "quantity": 4, "unitPriceExcludingTax": 60 }),
    )
    .await;

    let response = app
        .post(
            "/api/admin/invoices",
            json!({ "clientId": app.client.id, "quoteId": quote_id }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let invoice = response.json();
    assert!(invoice["invoiceNumber"].as_str().unwrap().starts_with("FAC-"));
    assert_eq!(invoice["status"], "pending");

    let items = app
        .get(&format!(
            "/api/admin/invoices/{}/items",
            invoice["id"].as_str().unwrap()
        ))
        .await
        .json();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["description"], "Peinture");
    assert_eq!(dec(&items[0]["totalIncludingTax"]), d("288.00"));
}

#[tokio::test]
async fn bundle_totals_follow_items() {
    let app = TestApp::spawn();
    let quote = app.create_quote("480").await;
    let quote_id = quote["id"].as_str().unwrap();

    let bundle = app.get(&format!("/api/quotes/{}/pdf", quote_id)).await.json();
    assert_eq!(dec(&bundle["totals"]["totalHt"]), d("480.00"));
    assert_eq!(dec(&bundle["totals"]["totalTtc"]), d("576.00"));
    assert_eq!(bundle["client"]["email"], "lucie.bernard@example.fr");

    app.post(
        &format!("/api/admin/quotes/{}/items", quote_id),
        json!({ "description": "Jante 19\"", "quantity": 2, "unitPriceExcludingTax": 100 }),
    )
    .await;

    let bundle = app
        .get(&format!("/api/admin/quotes/{}/pdf", quote_id))
        .await
        .json();
    assert_eq!(bundle["items"].as_array().unwrap().len(), 1);
    assert_eq!(dec(&bundle["totals"]["totalHt"]), d("200.00"));
    assert_eq!(dec(&bundle["totals"]["totalVat"]), d("40.00"));
    assert_eq!(dec(&bundle["totals"]["totalTtc"]), d("240.00"));
}

#[tokio::test]
async fn bundle_for_unknown_document_is_404() {
    let app = TestApp::spawn();

    let response = app.get(&format!("/api/invoices/{}/pdf", Uuid::new_v4())).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn quote_document_downloads_as_pdf() {
    let app = TestApp::spawn();
    let quote = app.create_quote("480").await;
    let reference = quote["reference"].as_str().unwrap();

    let response = app
        .get(&format!(
            "/api/admin/quotes/{}/document",
            quote["id"].as_str().unwrap()
        ))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers.get("content-type").unwrap(), "application/pdf");
    let disposition = response
        .headers
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(disposition.contains(&format!("{}.pdf", reference)));
    assert!(response.bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn label_sheet_and_qr_preview() {
    let app = TestApp::spawn();
    let quote = app.create_quote("480").await;
    let quote_id = quote["id"].as_str().unwrap();
    let reference = quote["reference"].as_str().unwrap();

    let sheet = app.get(&format!("/api/admin/quotes/{}/labels", quote_id)).await;
    assert_eq!(sheet.status, StatusCode::OK);
    assert!(sheet.bytes.starts_with(b"%PDF"));

    let qr = app
        .get(&format!("/api/admin/quotes/{}/labels/cle/qr", quote_id))
        .await
        .json();
    assert_eq!(qr["position"], "vehicle_key");
    assert_eq!(qr["payload"], format!("{}-CLÉ", reference));
    assert!(!qr["pngBase64"].as_str().unwrap().is_empty());

    let unknown = app
        .get(&format!("/api/admin/quotes/{}/labels/XYZ/qr", quote_id))
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn quote_status_update_is_audited_as_validation() {
    let app = TestApp::spawn();
    let quote = app.create_quote("480").await;
    let quote_id = quote["id"].as_str().unwrap();

    let response = app
        .patch(
            &format!("/api/admin/quotes/{}", quote_id),
            json!({ "status": "approved" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "approved");

    let logs = app
        .get(&format!("/api/admin/audit-logs?entityId={}", quote_id))
        .await
        .json();
    let latest = &logs["logs"][0];
    assert_eq!(latest["action"], "validated");
    assert_eq!(latest["actorName"], common::ADMIN_NAME);
    let changes = latest["changes"].as_array().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["field"], "status");
    assert_eq!(changes[0]["previousValue"], "pending");
    assert_eq!(changes[0]["newValue"], "approved");
}

#[tokio::test]
async fn unknown_quote_status_is_rejected() {
    let app = TestApp::spawn();
    let quote = app.create_quote("480").await;

    let response = app
        .patch(
            &format!("/api/admin/quotes/{}", quote["id"].as_str().unwrap()),
            json!({ "status": "archived" }),
        )
        .await;

    assert!(response.status.is_client_error());
}
