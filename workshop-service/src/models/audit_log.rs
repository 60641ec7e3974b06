//! Audit trail model. Logs and their changes are never updated or deleted
//! once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kinds of entity an audit log can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntityType {
    Quote,
    Invoice,
    Reservation,
    Service,
    Workflow,
    WorkflowStep,
    User,
    WorkshopTask,
}

impl AuditEntityType {
    pub const ALL: [AuditEntityType; 8] = [
        AuditEntityType::Quote,
        AuditEntityType::Invoice,
        AuditEntityType::Reservation,
        AuditEntityType::Service,
        AuditEntityType::Workflow,
        AuditEntityType::WorkflowStep,
        AuditEntityType::User,
        AuditEntityType::WorkshopTask,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEntityType::Quote => "quote",
            AuditEntityType::Invoice => "invoice",
            AuditEntityType::Reservation => "reservation",
            AuditEntityType::Service => "service",
            AuditEntityType::Workflow => "workflow",
            AuditEntityType::WorkflowStep => "workflow_step",
            AuditEntityType::User => "user",
            AuditEntityType::WorkshopTask => "workshop_task",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
    Validated,
    Rejected,
    Completed,
    Cancelled,
    Paid,
    Confirmed,
}

impl AuditAction {
    pub const ALL: [AuditAction; 9] = [
        AuditAction::Created,
        AuditAction::Updated,
        AuditAction::Deleted,
        AuditAction::Validated,
        AuditAction::Rejected,
        AuditAction::Completed,
        AuditAction::Cancelled,
        AuditAction::Paid,
        AuditAction::Confirmed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Updated => "updated",
            AuditAction::Deleted => "deleted",
            AuditAction::Validated => "validated",
            AuditAction::Rejected => "rejected",
            AuditAction::Completed => "completed",
            AuditAction::Cancelled => "cancelled",
            AuditAction::Paid => "paid",
            AuditAction::Confirmed => "confirmed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == s)
    }
}

/// Audit log entry. Actor fields are a snapshot taken at write time and
/// survive deletion of the actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub actor_id: Option<Uuid>,
    pub actor_role: String,
    pub actor_name: String,
    pub summary: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub changes: Vec<AuditLogChange>,
}

/// One changed field. Values keep their JSON type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogChange {
    pub id: Uuid,
    pub audit_log_id: Uuid,
    pub field: String,
    pub previous_value: serde_json::Value,
    pub new_value: serde_json::Value,
    pub position: i32,
}

/// Filter and page for listing audit logs.
#[derive(Debug, Clone)]
pub struct AuditLogFilter {
    pub entity_type: Option<AuditEntityType>,
    pub action: Option<AuditAction>,
    pub entity_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for AuditLogFilter {
    fn default() -> Self {
        Self {
            entity_type: None,
            action: None,
            entity_id: None,
            limit: 50,
            offset: 0,
        }
    }
}

impl AuditLogFilter {
    pub fn matches(&self, log: &AuditLog) -> bool {
        self.entity_type
            .map_or(true, |kind| log.entity_type == kind.as_str())
            && self.action.map_or(true, |action| log.action == action.as_str())
            && self.entity_id.map_or(true, |id| log.entity_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip_names() {
        for kind in AuditEntityType::ALL {
            assert_eq!(AuditEntityType::parse(kind.as_str()), Some(kind));
        }
        for action in AuditAction::ALL {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(AuditEntityType::parse("chat"), None);
        assert_eq!(AuditAction::parse("archived"), None);
    }
}
