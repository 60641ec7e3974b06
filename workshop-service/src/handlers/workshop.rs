use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use super::validate;
use crate::audit::{Actor, RequestContext};
use crate::dtos::{ReplaceWorkflowRequest, TaskCommentRequest, UpdateTaskRequest};
use crate::AppState;

pub async fn services_with_workflows(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.workshop.services_with_workflows().await?))
}

pub async fn replace_workflow(
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
    Json(payload): Json<ReplaceWorkflowRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate(&payload)?;
    let workflow = state
        .workshop
        .replace_workflow(service_id, payload.into(), &actor, &ctx)
        .await?;
    Ok(Json(workflow))
}

pub async fn confirm_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.workshop.confirm_reservation(id, &actor, &ctx).await?))
}

pub async fn reservation_tasks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.workshop.reservation_tasks(id).await?))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate(&payload)?;
    Ok(Json(
        state.workshop.patch_task(id, payload.into(), &actor, &ctx).await?,
    ))
}

pub async fn toggle_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.workshop.toggle_task(id, &actor, &ctx).await?))
}

pub async fn set_task_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
    Json(payload): Json<TaskCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate(&payload)?;
    Ok(Json(
        state
            .workshop
            .set_task_comment(id, payload.comment, &actor, &ctx)
            .await?,
    ))
}
