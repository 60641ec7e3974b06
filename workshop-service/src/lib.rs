pub mod audit;
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod pdf;
pub mod pricing;
pub mod services;
pub mod startup;
pub mod workflow;

use axum::middleware::from_fn;
use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use service_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};
use tower_http::trace::TraceLayer;

use config::WorkshopConfig;
use middleware::metrics_middleware;
use services::WorkshopService;

pub use startup::Application;

#[derive(Clone)]
pub struct AppState {
    pub workshop: WorkshopService,
    pub config: WorkshopConfig,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        // Quotes
        .route("/api/admin/quotes", post(handlers::documents::create_quote))
        .route(
            "/api/admin/quotes/:id",
            get(handlers::documents::get_quote).patch(handlers::documents::update_quote),
        )
        .route("/api/quotes/:id/pdf", get(handlers::documents::client_quote_bundle))
        .route("/api/admin/quotes/:id/pdf", get(handlers::documents::quote_bundle))
        .route(
            "/api/admin/quotes/:id/document",
            get(handlers::documents::quote_document),
        )
        .route(
            "/api/admin/quotes/:id/labels",
            get(handlers::documents::quote_labels),
        )
        .route(
            "/api/admin/quotes/:id/labels/:position/qr",
            get(handlers::documents::quote_label_qr),
        )
        .route(
            "/api/admin/quotes/:id/items",
            get(handlers::items::list_quote_items).post(handlers::items::add_quote_item),
        )
        .route(
            "/api/admin/quotes/:id/items/:item_id",
            delete(handlers::items::delete_nested_quote_item),
        )
        .route(
            "/api/admin/quote-items/:id",
            patch(handlers::items::update_quote_item).delete(handlers::items::delete_quote_item),
        )
        // Invoices
        .route("/api/admin/invoices", post(handlers::documents::create_invoice))
        .route(
            "/api/admin/invoices/:id",
            get(handlers::documents::get_invoice).patch(handlers::documents::update_invoice),
        )
        .route("/api/invoices/:id/pdf", get(handlers::documents::client_invoice_bundle))
        .route(
            "/api/admin/invoices/:id/pdf",
            get(handlers::documents::invoice_bundle),
        )
        .route(
            "/api/admin/invoices/:id/document",
            get(handlers::documents::invoice_document),
        )
        .route(
            "/api/admin/invoices/:id/labels",
            get(handlers::documents::invoice_labels),
        )
        .route(
            "/api/admin/invoices/:id/labels/:position/qr",
            get(handlers::documents::invoice_label_qr),
        )
        .route(
            "/api/admin/invoices/:id/items",
            get(handlers::items::list_invoice_items).post(handlers::items::add_invoice_item),
        )
        .route(
            "/api/admin/invoices/:id/items/:item_id",
            delete(handlers::items::delete_nested_invoice_item),
        )
        .route(
            "/api/admin/invoice-items/:id",
            patch(handlers::items::update_invoice_item)
                .delete(handlers::items::delete_invoice_item),
        )
        // Catalog, reservations and workshop
        .route(
            "/api/services-with-workflows",
            get(handlers::workshop::services_with_workflows),
        )
        .route(
            "/api/admin/services/:id/workflow",
            put(handlers::workshop::replace_workflow),
        )
        .route(
            "/api/admin/reservations/:id/confirm",
            post(handlers::workshop::confirm_reservation),
        )
        .route(
            "/api/admin/reservations/:id/tasks",
            get(handlers::workshop::reservation_tasks),
        )
        .route("/api/workshop/tasks/:id", patch(handlers::workshop::update_task))
        .route(
            "/api/workshop/tasks/:id/toggle",
            post(handlers::workshop::toggle_task),
        )
        .route(
            "/api/workshop/tasks/:id/comment",
            put(handlers::workshop::set_task_comment),
        )
        // Settings and audit
        .route(
            "/api/admin/settings",
            get(handlers::settings::get_settings).patch(handlers::settings::update_settings),
        )
        .route(
            "/api/admin/audit-logs",
            get(handlers::audit::list_audit_logs).post(handlers::audit::record_audit_event),
        )
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
