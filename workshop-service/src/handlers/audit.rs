use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use super::validate;
use crate::audit::{Actor, RequestContext};
use crate::dtos::{AuditLogsQuery, AuditLogsResponse, RecordAuditEventRequest};
use crate::models::AuditLogFilter;
use crate::services::workshop::MAX_AUDIT_LIMIT;
use crate::AppState;

pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = AuditLogFilter::try_from(query)?;
    let limit = filter.limit.clamp(1, MAX_AUDIT_LIMIT);
    let offset = filter.offset.max(0);
    let (logs, total) = state.workshop.list_audit_logs(filter).await?;
    Ok(Json(AuditLogsResponse {
        logs,
        total,
        limit,
        offset,
    }))
}

pub async fn record_audit_event(
    State(state): State<AppState>,
    actor: Actor,
    ctx: RequestContext,
    Json(payload): Json<RecordAuditEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate(&payload)?;
    let log = state
        .workshop
        .record_audit_event(payload.into(), &actor, &ctx)
        .await?;
    Ok((StatusCode::CREATED, Json(log)))
}
