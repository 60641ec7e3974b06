//! HTTP handlers for workshop-service.

pub mod audit;
pub mod documents;
pub mod items;
pub mod settings;
pub mod workshop;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use validator::Validate;

use crate::services::metrics::get_metrics;
use crate::services::workshop::RenderedDocument;
use crate::AppState;

/// Liveness plus a store round trip; 503 when the store is unreachable.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.workshop.store().health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": state.config.service_name,
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "service": state.config.service_name,
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
    }
}

pub async fn readiness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

pub(crate) fn validate<T: Validate>(payload: &T) -> Result<(), AppError> {
    payload.validate().map_err(AppError::ValidationError)
}

/// PDF download response with an attachment filename.
pub(crate) fn pdf_response(document: RenderedDocument) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document.filename),
            ),
        ],
        document.bytes,
    )
        .into_response()
}

/// Lookup and input errors pass through; anything else during generation is
/// reported as a generic failure.
pub(crate) fn document_failure(err: AppError) -> Response {
    match err {
        AppError::NotFound(_) | AppError::BadRequest(_) => err.into_response(),
        other => {
            tracing::error!(error = ?other, "Document generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to generate document" })),
            )
                .into_response()
        }
    }
}
