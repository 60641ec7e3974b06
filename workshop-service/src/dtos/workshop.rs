use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use super::double_option;
use crate::models::ApplicationSettings;
use crate::pdf::CompanyInfo;
use crate::services::workshop::WorkflowDraft;
use crate::workflow::{StepDraft, TaskPatch};

/// Body of `PATCH /api/workshop/tasks/:id`. An explicit `"comment": null`
/// clears the comment; an absent field leaves it unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub is_completed: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub comment: Option<Option<String>>,
}

/// Longest comment accepted on a workshop task.
pub const MAX_TASK_COMMENT_LENGTH: usize = 2000;

impl Validate for UpdateTaskRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match &self.comment {
            Some(Some(comment)) if comment.chars().count() > MAX_TASK_COMMENT_LENGTH => {
                let mut error = ValidationError::new("length");
                error.add_param("max".into(), &MAX_TASK_COMMENT_LENGTH);
                let mut errors = ValidationErrors::new();
                errors.add("comment", error);
                Err(errors)
            }
            _ => Ok(()),
        }
    }
}

impl From<UpdateTaskRequest> for TaskPatch {
    fn from(req: UpdateTaskRequest) -> Self {
        Self {
            is_completed: req.is_completed,
            comment: req.comment,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskCommentRequest {
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StepRequest {
    #[validate(length(max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceWorkflowRequest {
    #[validate(length(max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 100, message = "A workflow has at most 100 steps"))]
    #[validate(nested)]
    pub steps: Vec<StepRequest>,
}

impl From<ReplaceWorkflowRequest> for WorkflowDraft {
    fn from(req: ReplaceWorkflowRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            steps: req
                .steps
                .into_iter()
                .map(|s| StepDraft {
                    title: s.title,
                    description: s.description,
                })
                .collect(),
        }
    }
}

/// Stored settings plus the identity documents are printed with.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub settings: ApplicationSettings,
    pub company: CompanyInfo,
}
