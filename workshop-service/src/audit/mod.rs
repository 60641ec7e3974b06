//! Audit trail recorder: field-level diffs and event construction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{AuditAction, AuditEntityType, AuditLog, AuditLogChange};

/// Fields left out of snapshots; they change on every write.
const BOOKKEEPING_FIELDS: &[&str] = &["updatedAt"];

/// Who performed a mutation, as forwarded by the front layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Option<Uuid>,
    pub role: String,
    pub name: String,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            id: None,
            role: "admin".to_string(),
            name: "system".to_string(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    /// Admins see every client's documents; anyone else only their own.
    pub fn can_view_client(&self, client_id: Uuid) -> bool {
        self.is_admin() || self.id == Some(client_id)
    }
}

/// Where a mutation came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// One differing field between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: String,
    pub previous_value: Value,
    pub new_value: Value,
}

/// JSON snapshot of an entity, without bookkeeping fields.
pub fn snapshot<T: Serialize>(entity: &T) -> Value {
    let mut value = serde_json::to_value(entity).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        for field in BOOKKEEPING_FIELDS {
            map.remove(*field);
        }
    }
    value
}

/// Top-level diff of two JSON objects. A field missing on one side compares
/// as `null`. Non-object snapshots diff as a single `value` field.
pub fn diff_snapshots(before: &Value, after: &Value) -> Vec<FieldChange> {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            let mut fields: Vec<&String> = old.keys().collect();
            fields.extend(new.keys().filter(|k| !old.contains_key(*k)));

            fields
                .into_iter()
                .filter_map(|field| {
                    let previous = old.get(field).cloned().unwrap_or(Value::Null);
                    let next = new.get(field).cloned().unwrap_or(Value::Null);
                    (previous != next).then(|| FieldChange {
                        field: field.clone(),
                        previous_value: previous,
                        new_value: next,
                    })
                })
                .collect()
        }
        _ if before == after => Vec::new(),
        _ => vec![FieldChange {
            field: "value".to_string(),
            previous_value: before.clone(),
            new_value: after.clone(),
        }],
    }
}

pub fn diff<T: Serialize>(before: &T, after: &T) -> Vec<FieldChange> {
    diff_snapshots(&snapshot(before), &snapshot(after))
}

/// An audit event before it is stamped with actor and time.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub entity_type: AuditEntityType,
    pub entity_id: Uuid,
    pub action: AuditAction,
    pub summary: Option<String>,
    pub metadata: Option<Value>,
    pub changes: Vec<FieldChange>,
}

impl AuditEvent {
    pub fn new(entity_type: AuditEntityType, entity_id: Uuid, action: AuditAction) -> Self {
        Self {
            entity_type,
            entity_id,
            action,
            summary: None,
            metadata: None,
            changes: Vec::new(),
        }
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn changes(mut self, changes: Vec<FieldChange>) -> Self {
        self.changes = changes;
        self
    }

    /// Builds the immutable log row and its ordered changes.
    pub fn into_log(self, actor: &Actor, ctx: &RequestContext, now: DateTime<Utc>) -> AuditLog {
        let id = Uuid::new_v4();
        let changes = self
            .changes
            .into_iter()
            .zip(0..)
            .map(|(change, position)| AuditLogChange {
                id: Uuid::new_v4(),
                audit_log_id: id,
                field: change.field,
                previous_value: change.previous_value,
                new_value: change.new_value,
                position,
            })
            .collect();

        AuditLog {
            id,
            entity_type: self.entity_type.as_str().to_string(),
            entity_id: self.entity_id,
            action: self.action.as_str().to_string(),
            actor_id: actor.id,
            actor_role: actor.role.clone(),
            actor_name: actor.name.clone(),
            summary: self.summary,
            metadata: self.metadata,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            occurred_at: now,
            changes,
        }
    }
}

/// Action for an update whose status may have moved. `transition` maps the
/// new status to its dedicated action.
pub fn update_action<S: PartialEq>(
    before: Option<S>,
    after: Option<S>,
    transition: impl Fn(&S) -> AuditAction,
) -> AuditAction {
    match (before, after) {
        (before, Some(after)) if before.as_ref() != Some(&after) => transition(&after),
        _ => AuditAction::Updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuoteStatus;
    use serde_json::json;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        description: String,
        quantity: f64,
        tags: Vec<&'static str>,
        updated_at: i64,
    }

    #[test]
    fn test_diff_reports_only_changed_fields() {
        let before = Sample {
            description: "Peinture".to_string(),
            quantity: 2.0,
            tags: vec!["a"],
            updated_at: 1,
        };
        let after = Sample {
            description: "Peinture".to_string(),
            quantity: 3.0,
            tags: vec!["a", "b"],
            updated_at: 2,
        };

        let changes = diff(&before, &after);
        let fields: Vec<_> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["quantity", "tags"]);
        assert_eq!(changes[0].previous_value, json!(2.0));
        assert_eq!(changes[0].new_value, json!(3.0));
        assert_eq!(changes[1].new_value, json!(["a", "b"]));
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let value = json!({"a": 1, "b": {"c": true}});
        assert!(diff_snapshots(&value, &value.clone()).is_empty());
    }

    #[test]
    fn test_diff_added_and_removed_fields() {
        let changes = diff_snapshots(&json!({"a": 1}), &json!({"b": 2}));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].field, "a");
        assert_eq!(changes[0].new_value, Value::Null);
        assert_eq!(changes[1].field, "b");
        assert_eq!(changes[1].previous_value, Value::Null);
    }

    #[test]
    fn test_into_log_orders_changes() {
        let entity_id = Uuid::new_v4();
        let actor = Actor {
            id: Some(Uuid::new_v4()),
            role: "employee".to_string(),
            name: "Marie".to_string(),
        };
        let ctx = RequestContext {
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: None,
        };
        let log = AuditEvent::new(AuditEntityType::Quote, entity_id, AuditAction::Updated)
            .summary("Quote updated")
            .changes(diff_snapshots(
                &json!({"notes": null, "taxRate": "20"}),
                &json!({"notes": "urgent", "taxRate": "10"}),
            ))
            .into_log(&actor, &ctx, Utc::now());

        assert_eq!(log.entity_type, "quote");
        assert_eq!(log.action, "updated");
        assert_eq!(log.actor_name, "Marie");
        assert_eq!(log.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(log.changes.len(), 2);
        assert!(log.changes.iter().all(|c| c.audit_log_id == log.id));
        assert_eq!(log.changes[0].position, 0);
        assert_eq!(log.changes[1].position, 1);
    }

    #[test]
    fn test_update_action_from_status() {
        let transition = |s: &QuoteStatus| s.transition_action();
        assert_eq!(
            update_action(Some(QuoteStatus::Pending), Some(QuoteStatus::Approved), transition),
            AuditAction::Validated
        );
        assert_eq!(
            update_action(Some(QuoteStatus::Approved), Some(QuoteStatus::Approved), transition),
            AuditAction::Updated
        );
        assert_eq!(
            update_action(Some(QuoteStatus::Approved), Some(QuoteStatus::Pending), transition),
            AuditAction::Updated
        );
    }
}
