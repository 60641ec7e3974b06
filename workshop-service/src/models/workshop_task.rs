//! Workshop task: one workflow step instantiated for one reservation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Step number, title and description are copied from the workflow step when
/// the task is created. Later edits to the workflow do not reach existing
/// tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopTask {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub step_id: Uuid,
    pub step_number: i32,
    pub title: String,
    pub description: Option<String>,
    pub is_completed: bool,
    pub comment: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
