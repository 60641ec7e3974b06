#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use workshop_service::build_router;
use workshop_service::config::WorkshopConfig;
use workshop_service::models::{
    Client, Reservation, Service, Workflow, WorkflowStep, WorkflowWithSteps,
};
use workshop_service::services::MemoryStore;
use workshop_service::startup::build_state;

pub const ADMIN_ID: &str = "6f9d2c4e-3b1a-4d7e-9a55-0c2b8e7f1a23";
pub const ADMIN_NAME: &str = "Claire Dubois";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub client: Client,
    pub service: Service,
    pub bare_service: Service,
    pub reservation: Reservation,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }
}

impl TestApp {
    /// Memory-backed app seeded with one client, a service with a three-step
    /// workflow, a service without workflow and a pending reservation.
    pub fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        let client = Client {
            id: Uuid::new_v4(),
            email: "lucie.bernard@example.fr".to_string(),
            first_name: Some("Lucie".to_string()),
            last_name: Some("Bernard".to_string()),
            address: Some("4 place Bellecour".to_string()),
            postal_code: Some("69002".to_string()),
            city: Some("Lyon".to_string()),
            role: "client".to_string(),
            ..Default::default()
        };
        let service = Service {
            id: Uuid::new_v4(),
            name: "Rénovation complète".to_string(),
            description: Some("Décapage, peinture et vernis".to_string()),
            base_price: Decimal::from(480),
            estimated_duration: Some(480),
            category: Some("renovation".to_string()),
            is_active: true,
        };
        let bare_service = Service {
            id: Uuid::new_v4(),
            name: "Diagnostic".to_string(),
            description: None,
            base_price: Decimal::from(40),
            estimated_duration: Some(30),
            category: None,
            is_active: false,
        };

        let workflow_id = Uuid::new_v4();
        let steps = ["Démontage", "Microbillage", "Peinture"]
            .iter()
            .enumerate()
            .map(|(i, title)| WorkflowStep {
                id: Uuid::new_v4(),
                workflow_id,
                step_number: i as i32 + 1,
                title: title.to_string(),
                description: None,
            })
            .collect();
        let workflow = WorkflowWithSteps::new(
            Workflow {
                id: workflow_id,
                service_id: service.id,
                name: "Rénovation standard".to_string(),
                description: None,
                created_at: now,
                updated_at: now,
            },
            steps,
        );
        let reservation = Reservation::new(client.id, service.id, now);

        store.insert_client(client.clone()).unwrap();
        store.insert_service(service.clone()).unwrap();
        store.insert_service(bare_service.clone()).unwrap();
        store.insert_workflow(workflow).unwrap();
        store.insert_reservation(reservation.clone()).unwrap();

        let state = build_state(WorkshopConfig::for_tests(), store.clone());
        Self {
            router: build_router(state),
            store,
            client,
            service,
            bare_service,
            reservation,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", ADMIN_ID)
            .header("x-user-role", "admin")
            .header("x-user-name", ADMIN_NAME)
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header(header::USER_AGENT, "atelier-tests");
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();
        TestResponse {
            status,
            headers,
            bytes,
        }
    }

    /// GET as a client of the workshop rather than as an admin.
    pub async fn get_as_client(&self, uri: &str, client_id: Uuid) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header("x-user-id", client_id.to_string())
            .header("x-user-role", "client")
            .body(Body::empty())
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();
        TestResponse {
            status,
            headers,
            bytes,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None).await
    }

    /// Seeds another client and returns it.
    pub fn seed_other_client(&self) -> Client {
        let client = Client {
            id: Uuid::new_v4(),
            email: "marc.petit@example.fr".to_string(),
            first_name: Some("Marc".to_string()),
            last_name: Some("Petit".to_string()),
            city: Some("Villeurbanne".to_string()),
            role: "client".to_string(),
            ..Default::default()
        };
        self.store.insert_client(client.clone()).unwrap();
        client
    }

    /// Creates a quote for the seeded client and returns its JSON.
    pub async fn create_quote(&self, price: &str) -> Value {
        let response = self
            .post(
                "/api/admin/quotes",
                serde_json::json!({
                    "clientId": self.client.id,
                    "serviceId": self.service.id,
                    "wheelCount": 4,
                    "diameter": "18",
                    "priceExcludingTax": price,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.json());
        response.json()
    }

    pub async fn confirm_reservation(&self) -> Value {
        let response = self
            .post(
                &format!("/api/admin/reservations/{}/confirm", self.reservation.id),
                serde_json::json!({}),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.json());
        response.json()
    }
}

/// Decimal from a JSON string or number.
pub fn dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
        other => panic!("not a decimal: {:?}", other),
    }
}

pub fn d(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}
