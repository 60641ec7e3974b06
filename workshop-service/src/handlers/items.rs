use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use super::validate;
use crate::audit::{Actor, RequestContext};
use crate::dtos::{CreateItemRequest, UpdateItemRequest};
use crate::models::{DocumentItem, DocumentKind};
use crate::AppState;

pub async fn list_quote_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.workshop.list_items(DocumentKind::Quote, id).await?))
}

pub async fn list_invoice_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.workshop.list_items(DocumentKind::Invoice, id).await?))
}

pub async fn add_quote_item(
    state: State<AppState>,
    path: Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
    payload: Json<CreateItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    add_item(DocumentKind::Quote, state, path, actor, ctx, payload).await
}

pub async fn add_invoice_item(
    state: State<AppState>,
    path: Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
    payload: Json<CreateItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    add_item(DocumentKind::Invoice, state, path, actor, ctx, payload).await
}

pub async fn update_quote_item(
    state: State<AppState>,
    path: Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
    payload: Json<UpdateItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    update_item(DocumentKind::Quote, state, path, actor, ctx, payload).await
}

pub async fn update_invoice_item(
    state: State<AppState>,
    path: Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
    payload: Json<UpdateItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    update_item(DocumentKind::Invoice, state, path, actor, ctx, payload).await
}

pub async fn delete_quote_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    state
        .workshop
        .delete_item(DocumentKind::Quote, item_id, &actor, &ctx)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_invoice_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    state
        .workshop
        .delete_item(DocumentKind::Invoice, item_id, &actor, &ctx)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/admin/quotes/:id/items/:item_id`; the item must belong to
/// the quote.
pub async fn delete_nested_quote_item(
    State(state): State<AppState>,
    Path((document_id, item_id)): Path<(Uuid, Uuid)>,
    actor: Actor,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    delete_nested(state, DocumentKind::Quote, document_id, item_id, actor, ctx).await
}

pub async fn delete_nested_invoice_item(
    State(state): State<AppState>,
    Path((document_id, item_id)): Path<(Uuid, Uuid)>,
    actor: Actor,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    delete_nested(state, DocumentKind::Invoice, document_id, item_id, actor, ctx).await
}

async fn add_item(
    kind: DocumentKind,
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
    Json(payload): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<DocumentItem>), AppError> {
    validate(&payload)?;
    let item = state
        .workshop
        .add_item(kind, document_id, payload.into(), &actor, &ctx)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    kind: DocumentKind,
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<Json<DocumentItem>, AppError> {
    validate(&payload)?;
    let item = state
        .workshop
        .update_item(kind, item_id, payload.into(), &actor, &ctx)
        .await?;
    Ok(Json(item))
}

async fn delete_nested(
    state: AppState,
    kind: DocumentKind,
    document_id: Uuid,
    item_id: Uuid,
    actor: Actor,
    ctx: RequestContext,
) -> Result<StatusCode, AppError> {
    let items = state.workshop.list_items(kind, document_id).await?;
    if !items.iter().any(|item| item.id == item_id) {
        return Err(AppError::not_found("Item"));
    }
    state.workshop.delete_item(kind, item_id, &actor, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}
