use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use super::{document_failure, pdf_response, validate};
use crate::audit::{Actor, RequestContext};
use crate::dtos::{CreateInvoiceRequest, CreateQuoteRequest, UpdateInvoiceRequest, UpdateQuoteRequest};
use crate::models::DocumentKind;
use crate::AppState;

pub async fn create_quote(
    State(state): State<AppState>,
    actor: Actor,
    ctx: RequestContext,
    Json(payload): Json<CreateQuoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate(&payload)?;
    let quote = state.workshop.create_quote(payload.into(), &actor, &ctx).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

pub async fn get_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.workshop.get_quote(id).await?))
}

pub async fn update_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
    Json(payload): Json<UpdateQuoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate(&payload)?;
    Ok(Json(
        state.workshop.update_quote(id, payload.into(), &actor, &ctx).await?,
    ))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    actor: Actor,
    ctx: RequestContext,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate(&payload)?;
    let invoice = state.workshop.create_invoice(payload.into(), &actor, &ctx).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.workshop.get_invoice(id).await?))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    ctx: RequestContext,
    Json(payload): Json<UpdateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate(&payload)?;
    Ok(Json(
        state.workshop.update_invoice(id, payload.into(), &actor, &ctx).await?,
    ))
}

pub async fn quote_bundle(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    bundle(state, DocumentKind::Quote, id).await
}

pub async fn invoice_bundle(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    bundle(state, DocumentKind::Invoice, id).await
}

pub async fn client_quote_bundle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Response {
    owned_bundle(state, DocumentKind::Quote, id, &actor).await
}

pub async fn client_invoice_bundle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Response {
    owned_bundle(state, DocumentKind::Invoice, id, &actor).await
}

pub async fn quote_document(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    document(state, DocumentKind::Quote, id).await
}

pub async fn invoice_document(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    document(state, DocumentKind::Invoice, id).await
}

pub async fn quote_labels(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    labels(state, DocumentKind::Quote, id).await
}

pub async fn invoice_labels(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    labels(state, DocumentKind::Invoice, id).await
}

pub async fn quote_label_qr(
    State(state): State<AppState>,
    Path((id, position)): Path<(Uuid, String)>,
) -> Response {
    label_qr(state, DocumentKind::Quote, id, &position).await
}

pub async fn invoice_label_qr(
    State(state): State<AppState>,
    Path((id, position)): Path<(Uuid, String)>,
) -> Response {
    label_qr(state, DocumentKind::Invoice, id, &position).await
}

async fn bundle(state: AppState, kind: DocumentKind, id: Uuid) -> Response {
    match state.workshop.document_bundle(kind, id).await {
        Ok(bundle) => Json(bundle).into_response(),
        Err(e) => document_failure(e),
    }
}

/// A document that belongs to another client answers 404, as if it did not
/// exist.
async fn owned_bundle(state: AppState, kind: DocumentKind, id: Uuid, actor: &Actor) -> Response {
    match state.workshop.document_bundle(kind, id).await {
        Ok(bundle) if actor.can_view_client(bundle.client.id) => Json(bundle).into_response(),
        Ok(_) => {
            tracing::warn!(document_id = %id, actor_id = ?actor.id, "Document requested by another client");
            document_failure(AppError::not_found(entity_name(kind)))
        }
        Err(e) => document_failure(e),
    }
}

fn entity_name(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Quote => "Quote",
        DocumentKind::Invoice => "Invoice",
    }
}

async fn document(state: AppState, kind: DocumentKind, id: Uuid) -> Response {
    match state.workshop.render_document(kind, id).await {
        Ok(rendered) => pdf_response(rendered),
        Err(e) => document_failure(e),
    }
}

async fn labels(state: AppState, kind: DocumentKind, id: Uuid) -> Response {
    match state.workshop.render_labels(kind, id).await {
        Ok(rendered) => pdf_response(rendered),
        Err(e) => document_failure(e),
    }
}

async fn label_qr(state: AppState, kind: DocumentKind, id: Uuid, position: &str) -> Response {
    match state.workshop.label_qr(kind, id, position).await {
        Ok(qr) => Json(qr).into_response(),
        Err(e) => document_failure(e),
    }
}
