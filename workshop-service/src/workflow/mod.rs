//! Workshop task state machine.
//!
//! A task is either pending (`is_completed == false`, no `completed_at`) or
//! completed (`is_completed == true`, `completed_at` set when it got there).
//! Both directions are allowed. Comments are independent of completion.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{WorkflowStep, WorkflowWithSteps, WorkshopTask};

/// Partial update of a task. `comment: Some(None)` clears the comment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub is_completed: Option<bool>,
    pub comment: Option<Option<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.is_completed.is_none() && self.comment.is_none()
    }
}

/// Direction of a completion change, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTransition {
    Completed,
    Reopened,
    Unchanged,
}

impl TaskTransition {
    pub fn between(before: &WorkshopTask, after: &WorkshopTask) -> Self {
        match (before.is_completed, after.is_completed) {
            (false, true) => TaskTransition::Completed,
            (true, false) => TaskTransition::Reopened,
            _ => TaskTransition::Unchanged,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskTransition::Completed => "completed",
            TaskTransition::Reopened => "reopened",
            TaskTransition::Unchanged => "unchanged",
        }
    }
}

pub fn set_completion(task: &WorkshopTask, completed: bool, now: DateTime<Utc>) -> WorkshopTask {
    let mut next = task.clone();
    if task.is_completed == completed {
        return next;
    }
    next.is_completed = completed;
    next.completed_at = completed.then_some(now);
    next.updated_at = now;
    next
}

pub fn toggle(task: &WorkshopTask, now: DateTime<Utc>) -> WorkshopTask {
    set_completion(task, !task.is_completed, now)
}

/// Blank comments are stored as no comment.
pub fn set_comment(task: &WorkshopTask, comment: Option<String>, now: DateTime<Utc>) -> WorkshopTask {
    let comment = comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    let mut next = task.clone();
    if next.comment != comment {
        next.comment = comment;
        next.updated_at = now;
    }
    next
}

pub fn apply_patch(task: &WorkshopTask, patch: &TaskPatch, now: DateTime<Utc>) -> WorkshopTask {
    let mut next = task.clone();
    if let Some(completed) = patch.is_completed {
        next = set_completion(&next, completed, now);
    }
    if let Some(comment) = &patch.comment {
        next = set_comment(&next, comment.clone(), now);
    }
    next
}

/// `round(100 * completed / total)`, 0 for an empty set.
pub fn progress_percent(tasks: &[WorkshopTask]) -> u8 {
    let total = tasks.len() as u64;
    if total == 0 {
        return 0;
    }
    let completed = tasks.iter().filter(|t| t.is_completed).count() as u64;
    ((200 * completed + total) / (2 * total)) as u8
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBoard {
    pub tasks: Vec<WorkshopTask>,
    pub completed: usize,
    pub total: usize,
    pub progress_percent: u8,
}

impl TaskBoard {
    pub fn new(mut tasks: Vec<WorkshopTask>) -> Self {
        sort_tasks(&mut tasks);
        Self {
            completed: tasks.iter().filter(|t| t.is_completed).count(),
            total: tasks.len(),
            progress_percent: progress_percent(&tasks),
            tasks,
        }
    }
}

/// Step order, then creation order for ties.
pub fn sort_tasks(tasks: &mut [WorkshopTask]) {
    tasks.sort_by(|a, b| {
        a.step_number
            .cmp(&b.step_number)
            .then(a.created_at.cmp(&b.created_at))
    });
}

/// One pending task per step, in step order, with the step's text copied in.
pub fn instantiate_tasks(
    reservation_id: Uuid,
    workflow: &WorkflowWithSteps,
    now: DateTime<Utc>,
) -> Vec<WorkshopTask> {
    let mut steps: Vec<&WorkflowStep> = workflow.steps.iter().collect();
    steps.sort_by_key(|s| s.step_number);
    steps
        .into_iter()
        .map(|step| WorkshopTask {
            id: Uuid::new_v4(),
            reservation_id,
            step_id: step.id,
            step_number: step.step_number,
            title: step.title.clone(),
            description: step.description.clone(),
            is_completed: false,
            comment: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
        .collect()
}

/// Step definition as submitted by workflow management.
#[derive(Debug, Clone)]
pub struct StepDraft {
    pub title: String,
    pub description: Option<String>,
}

/// Numbers steps 1..n in submitted order.
pub fn build_steps(workflow_id: Uuid, drafts: &[StepDraft]) -> Vec<WorkflowStep> {
    drafts
        .iter()
        .zip(1..)
        .map(|(draft, step_number)| WorkflowStep {
            id: Uuid::new_v4(),
            workflow_id,
            step_number,
            title: draft.title.trim().to_string(),
            description: draft
                .description
                .as_ref()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Workflow;
    use chrono::Duration;

    fn task(step_number: i32) -> WorkshopTask {
        let now = Utc::now();
        WorkshopTask {
            id: Uuid::new_v4(),
            reservation_id: Uuid::new_v4(),
            step_id: Uuid::new_v4(),
            step_number,
            title: format!("Step {}", step_number),
            description: None,
            is_completed: false,
            comment: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn workflow(titles: &[(i32, &str)]) -> WorkflowWithSteps {
        let workflow_id = Uuid::new_v4();
        let now = Utc::now();
        WorkflowWithSteps::new(
            Workflow {
                id: workflow_id,
                service_id: Uuid::new_v4(),
                name: "Rénovation".to_string(),
                description: None,
                created_at: now,
                updated_at: now,
            },
            titles
                .iter()
                .map(|(n, title)| WorkflowStep {
                    id: Uuid::new_v4(),
                    workflow_id,
                    step_number: *n,
                    title: title.to_string(),
                    description: None,
                })
                .collect(),
        )
    }

    #[test]
    fn test_toggle_sets_and_clears_completed_at() {
        let now = Utc::now();
        let pending = task(1);

        let done = toggle(&pending, now);
        assert!(done.is_completed);
        assert_eq!(done.completed_at, Some(now));

        let reopened = toggle(&done, now + Duration::minutes(3));
        assert!(!reopened.is_completed);
        assert_eq!(reopened.completed_at, None);
    }

    #[test]
    fn test_set_completion_is_idempotent() {
        let first = Utc::now();
        let done = set_completion(&task(1), true, first);
        let again = set_completion(&done, true, first + Duration::hours(1));
        assert_eq!(again, done);
    }

    #[test]
    fn test_comment_independent_of_completion() {
        let now = Utc::now();
        let done = toggle(&task(1), now);
        let commented = set_comment(&done, Some("Rayure sur la jante AVD".to_string()), now);
        assert!(commented.is_completed);
        assert_eq!(commented.comment.as_deref(), Some("Rayure sur la jante AVD"));

        let cleared = set_comment(&commented, Some("   ".to_string()), now);
        assert_eq!(cleared.comment, None);
        assert!(cleared.is_completed);
    }

    #[test]
    fn test_patch_leaves_unspecified_fields() {
        let now = Utc::now();
        let start = set_comment(&task(2), Some("ok".to_string()), now);
        let patched = apply_patch(
            &start,
            &TaskPatch {
                is_completed: Some(true),
                comment: None,
            },
            now,
        );
        assert!(patched.is_completed);
        assert_eq!(patched.comment.as_deref(), Some("ok"));

        let cleared = apply_patch(
            &patched,
            &TaskPatch {
                is_completed: None,
                comment: Some(None),
            },
            now,
        );
        assert!(cleared.is_completed);
        assert_eq!(cleared.comment, None);
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(&[]), 0);

        let now = Utc::now();
        let mut tasks: Vec<_> = (1..=5).map(task).collect();
        tasks[0] = toggle(&tasks[0], now);
        tasks[3] = toggle(&tasks[3], now);
        assert_eq!(progress_percent(&tasks), 40);

        let thirds: Vec<_> = (1..=3)
            .map(|n| if n == 1 { toggle(&task(n), now) } else { task(n) })
            .collect();
        assert_eq!(progress_percent(&thirds), 33);

        let two_thirds: Vec<_> = (1..=3)
            .map(|n| if n < 3 { toggle(&task(n), now) } else { task(n) })
            .collect();
        assert_eq!(progress_percent(&two_thirds), 67);
    }

    #[test]
    fn test_progress_never_decreases_while_completing() {
        let now = Utc::now();
        let mut tasks: Vec<_> = (1..=7).map(task).collect();
        let mut last = progress_percent(&tasks);
        for i in 0..tasks.len() {
            tasks[i] = toggle(&tasks[i], now);
            let current = progress_percent(&tasks);
            assert!(current >= last);
            last = current;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn test_instantiate_tasks_in_step_order() {
        let wf = workflow(&[(3, "Vernis"), (1, "Démontage"), (2, "Peinture")]);
        let reservation_id = Uuid::new_v4();
        let tasks = instantiate_tasks(reservation_id, &wf, Utc::now());

        let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Démontage", "Peinture", "Vernis"]);
        assert!(tasks.iter().all(|t| t.reservation_id == reservation_id));
        assert!(tasks.iter().all(|t| !t.is_completed && t.completed_at.is_none()));
    }

    #[test]
    fn test_board_sorts_by_step_number() {
        let board = TaskBoard::new(vec![task(4), task(1), task(3), task(2)]);
        let numbers: Vec<_> = board.tasks.iter().map(|t| t.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(board.total, 4);
        assert_eq!(board.completed, 0);
    }

    #[test]
    fn test_build_steps_renumbers() {
        let steps = build_steps(
            Uuid::new_v4(),
            &[
                StepDraft {
                    title: " Sablage ".to_string(),
                    description: Some(String::new()),
                },
                StepDraft {
                    title: "Peinture".to_string(),
                    description: Some("Deux couches".to_string()),
                },
            ],
        );
        assert_eq!(steps[0].step_number, 1);
        assert_eq!(steps[0].title, "Sablage");
        assert_eq!(steps[0].description, None);
        assert_eq!(steps[1].step_number, 2);
    }
}
