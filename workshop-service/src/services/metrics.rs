//! Prometheus metrics for workshop-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// HTTP request counter by route and status.
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workshop_http_requests_total",
        "Total number of HTTP requests",
        &["route", "status"]
    )
    .expect("Failed to register http_requests_total")
});

/// Store operation duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "workshop_db_query_duration_seconds",
        "Store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Rendered documents by kind (quote, invoice, labels).
pub static DOCUMENTS_RENDERED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workshop_documents_rendered_total",
        "Total number of rendered PDF documents",
        &["kind", "outcome"]
    )
    .expect("Failed to register documents_rendered_total")
});

/// Audit events written, by entity type and action.
pub static AUDIT_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workshop_audit_events_total",
        "Total number of audit events recorded",
        &["entity_type", "action"]
    )
    .expect("Failed to register audit_events_total")
});

/// Task completion changes by direction.
pub static TASK_TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workshop_task_transitions_total",
        "Total number of workshop task transitions",
        &["direction"]
    )
    .expect("Failed to register task_transitions_total")
});

/// Logo fetches that fell back to the text header.
pub static LOGO_FALLBACKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "workshop_logo_fallbacks_total",
        "Total number of logo loads that fell back to text",
        &["reason"]
    )
    .expect("Failed to register logo_fallbacks_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&DOCUMENTS_RENDERED_TOTAL);
    Lazy::force(&AUDIT_EVENTS_TOTAL);
    Lazy::force(&TASK_TRANSITIONS_TOTAL);
    Lazy::force(&LOGO_FALLBACKS_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
