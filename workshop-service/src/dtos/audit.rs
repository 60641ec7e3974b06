use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::audit::{AuditEvent, FieldChange};
use crate::models::{AuditAction, AuditEntityType, AuditLog, AuditLogFilter};
use crate::services::workshop::DEFAULT_AUDIT_LIMIT;

/// Query string of `GET /api/admin/audit-logs`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogsQuery {
    pub entity_type: Option<String>,
    pub action: Option<String>,
    pub entity_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl TryFrom<AuditLogsQuery> for AuditLogFilter {
    type Error = AppError;

    fn try_from(query: AuditLogsQuery) -> Result<Self, Self::Error> {
        let entity_type = match query.entity_type.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(AuditEntityType::parse(raw).ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("Unknown entity type: {}", raw))
            })?),
            None => None,
        };
        let action = match query.action.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(
                AuditAction::parse(raw)
                    .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown action: {}", raw)))?,
            ),
            None => None,
        };

        Ok(AuditLogFilter {
            entity_type,
            action,
            entity_id: query.entity_id,
            limit: query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT),
            offset: query.offset.unwrap_or(0),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogsResponse {
    pub logs: Vec<AuditLog>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    pub field: String,
    #[serde(default)]
    pub previous_value: Value,
    #[serde(default)]
    pub new_value: Value,
}

/// Event reported by another part of the platform, such as the user
/// management back office.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordAuditEventRequest {
    pub entity_type: AuditEntityType,
    pub entity_id: Uuid,
    pub action: AuditAction,
    #[validate(length(max = 500))]
    pub summary: Option<String>,
    pub metadata: Option<Value>,
    #[serde(default)]
    pub changes: Vec<ChangeRequest>,
}

impl From<RecordAuditEventRequest> for AuditEvent {
    fn from(req: RecordAuditEventRequest) -> Self {
        let mut event = AuditEvent::new(req.entity_type, req.entity_id, req.action).changes(
            req.changes
                .into_iter()
                .map(|c| FieldChange {
                    field: c.field,
                    previous_value: c.previous_value,
                    new_value: c.new_value,
                })
                .collect(),
        );
        if let Some(summary) = req.summary {
            event = event.summary(summary);
        }
        if let Some(metadata) = req.metadata {
            event = event.metadata(metadata);
        }
        event
    }
}
