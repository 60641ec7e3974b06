//! Business operations over a [`Store`].
//!
//! Every audited mutation builds its [`AuditLog`] here and hands it to the
//! store together with the entity, so both are written at once.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use service_core::error::AppError;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::audit::{self, Actor, AuditEvent, RequestContext};
use crate::models::{
    ApplicationSettings, AuditAction, AuditEntityType, AuditLog, AuditLogFilter, Client,
    CreateDocumentItem, CreateInvoice, CreateQuote, DocumentItem, DocumentKind, Invoice,
    InvoiceStatus, Quote, QuoteStatus, Reservation, ReservationStatus, Service,
    ServiceWithWorkflow, UpdateDocumentItem, UpdateInvoice, UpdateQuote, UpdateSettings, Workflow,
    WorkflowWithSteps, WorkshopTask,
};
use crate::pdf::{self, LabelPosition, LogoLoader, PdfError};
use crate::pricing::{DocumentLines, DocumentTotals, MAX_QUANTITY, MAX_TAX_RATE, MAX_UNIT_PRICE};
use crate::services::metrics::{AUDIT_EVENTS_TOTAL, DOCUMENTS_RENDERED_TOTAL, TASK_TRANSITIONS_TOTAL};
use crate::services::store::Store;
use crate::workflow::{self, StepDraft, TaskBoard, TaskPatch, TaskTransition};

pub const DEFAULT_AUDIT_LIMIT: i64 = 50;
pub const MAX_AUDIT_LIMIT: i64 = 200;

/// `DEV-2024-00007`, `FAC-2024-00012`.
pub fn document_number(kind: DocumentKind, year: i32, sequence: i64) -> String {
    format!("{}-{}-{:05}", kind.number_prefix(), year, sequence)
}

/// The document a bundle was built for.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BundleDocument {
    Quote(Quote),
    Invoice(Invoice),
}

/// Everything a renderer needs for one quote or invoice.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentBundle {
    pub kind: DocumentKind,
    pub document: BundleDocument,
    pub client: Client,
    pub service: Option<Service>,
    /// Originating quote of an invoice.
    pub quote: Option<Quote>,
    pub items: Vec<DocumentItem>,
    pub settings: Option<ApplicationSettings>,
    pub totals: DocumentTotals,
}

impl DocumentBundle {
    pub fn number(&self) -> &str {
        match &self.document {
            BundleDocument::Quote(quote) => &quote.reference,
            BundleDocument::Invoice(invoice) => &invoice.invoice_number,
        }
    }
}

/// A rendered PDF and its download name.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Base64 PNG preview of one label's QR code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelQr {
    pub position: LabelPosition,
    pub code: &'static str,
    pub payload: String,
    pub png_base64: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedReservation {
    pub reservation: Reservation,
    #[serde(flatten)]
    pub board: TaskBoard,
}

/// Item fields as submitted; any of the first three may be missing.
#[derive(Debug, Clone, Default)]
pub struct ItemDraft {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price_excluding_tax: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub position: Option<i32>,
}

/// Workflow definition as submitted by workflow management.
#[derive(Debug, Clone)]
pub struct WorkflowDraft {
    pub name: Option<String>,
    pub description: Option<String>,
    pub steps: Vec<StepDraft>,
}

#[derive(Clone)]
pub struct WorkshopService {
    store: Arc<dyn Store>,
    logo_loader: LogoLoader,
}

impl WorkshopService {
    pub fn new(store: Arc<dyn Store>, logo_loader: LogoLoader) -> Self {
        Self { store, logo_loader }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn audit_log(&self, event: AuditEvent, actor: &Actor, ctx: &RequestContext, now: DateTime<Utc>) -> AuditLog {
        event.into_log(actor, ctx, now)
    }

    fn count_audit(log: &AuditLog) {
        AUDIT_EVENTS_TOTAL
            .with_label_values(&[&log.entity_type, &log.action])
            .inc();
    }

    async fn require_client(&self, id: Uuid) -> Result<Client, AppError> {
        self.store
            .get_client(id)
            .await?
            .ok_or_else(|| AppError::not_found("Client"))
    }

    async fn require_service(&self, id: Uuid) -> Result<Service, AppError> {
        self.store
            .get_service(id)
            .await?
            .ok_or_else(|| AppError::not_found("Service"))
    }

    async fn optional_service(&self, id: Option<Uuid>) -> Result<Option<Service>, AppError> {
        match id {
            Some(id) => self.store.get_service(id).await,
            None => Ok(None),
        }
    }

    async fn require_document(&self, kind: DocumentKind, id: Uuid) -> Result<(), AppError> {
        let exists = match kind {
            DocumentKind::Quote => self.store.get_quote(id).await?.is_some(),
            DocumentKind::Invoice => self.store.get_invoice(id).await?.is_some(),
        };
        if exists {
            Ok(())
        } else {
            Err(AppError::not_found(entity_label(kind)))
        }
    }

    async fn allocate_number(&self, kind: DocumentKind, now: DateTime<Utc>) -> Result<String, AppError> {
        let year = now.year();
        let sequence = self.store.next_document_sequence(kind, year).await?;
        Ok(document_number(kind, year, sequence))
    }

    // -------------------------------------------------------------------------
    // Quotes
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input, actor, ctx), fields(client_id = %input.client_id))]
    pub async fn create_quote(
        &self,
        input: CreateQuote,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> Result<Quote, AppError> {
        ensure_unit_price("priceExcludingTax", Some(input.price_excluding_tax))?;
        ensure_tax_rate(Some(input.tax_rate))?;
        self.require_client(input.client_id).await?;
        if let Some(service_id) = input.service_id {
            self.require_service(service_id).await?;
        }

        let now = Utc::now();
        let reference = self.allocate_number(DocumentKind::Quote, now).await?;
        let quote = Quote::new(&input, reference, now);

        let log = self.audit_log(
            AuditEvent::new(AuditEntityType::Quote, quote.id, AuditAction::Created)
                .summary(format!("Devis {} créé", quote.reference))
                .metadata(json!({ "reference": quote.reference, "clientId": quote.client_id })),
            actor,
            ctx,
            now,
        );
        let saved = self.store.insert_quote(quote, log.clone()).await?;
        Self::count_audit(&log);

        info!(quote_id = %saved.id, reference = %saved.reference, "Quote created");
        Ok(saved)
    }

    pub async fn get_quote(&self, id: Uuid) -> Result<Quote, AppError> {
        self.store
            .get_quote(id)
            .await?
            .ok_or_else(|| AppError::not_found("Quote"))
    }

    #[instrument(skip(self, update, actor, ctx), fields(quote_id = %id))]
    pub async fn update_quote(
        &self,
        id: Uuid,
        update: UpdateQuote,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> Result<Quote, AppError> {
        ensure_unit_price("priceExcludingTax", update.price_excluding_tax)?;
        ensure_tax_rate(update.tax_rate)?;
        if let Some(service_id) = update.service_id {
            self.require_service(service_id).await?;
        }

        let before = self.get_quote(id).await?;
        let now = Utc::now();
        let after = before.with_update(&update, now);

        let action = audit::update_action(before.status(), after.status(), QuoteStatus::transition_action);
        let log = self.audit_log(
            AuditEvent::new(AuditEntityType::Quote, id, action)
                .summary(format!("Devis {} modifié", after.reference))
                .changes(audit::diff(&before, &after)),
            actor,
            ctx,
            now,
        );
        let saved = self.store.update_quote(after, log.clone()).await?;
        Self::count_audit(&log);
        Ok(saved)
    }

    // -------------------------------------------------------------------------
    // Invoices
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input, actor, ctx), fields(client_id = %input.client_id))]
    pub async fn create_invoice(
        &self,
        input: CreateInvoice,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> Result<Invoice, AppError> {
        ensure_unit_price("priceExcludingTax", input.price_excluding_tax)?;
        ensure_tax_rate(input.tax_rate)?;
        self.require_client(input.client_id).await?;
        if let Some(service_id) = input.service_id {
            self.require_service(service_id).await?;
        }
        let quote = match input.quote_id {
            Some(quote_id) => Some(self.get_quote(quote_id).await?),
            None => None,
        };
        if let Some(quote) = &quote {
            if quote.client_id != input.client_id {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Quote {} belongs to another client",
                    quote.reference
                )));
            }
        }

        let now = Utc::now();
        let number = self.allocate_number(DocumentKind::Invoice, now).await?;
        let invoice = Invoice::new(&input, quote.as_ref(), number, now);

        let items = match &quote {
            Some(quote) => self
                .store
                .list_items(DocumentKind::Quote, quote.id)
                .await?
                .iter()
                .map(|item| item.copy_to(invoice.id, now))
                .collect(),
            None => Vec::new(),
        };

        let log = self.audit_log(
            AuditEvent::new(AuditEntityType::Invoice, invoice.id, AuditAction::Created)
                .summary(format!("Facture {} créée", invoice.invoice_number))
                .metadata(json!({
                    "invoiceNumber": invoice.invoice_number,
                    "clientId": invoice.client_id,
                    "quoteId": invoice.quote_id,
                    "copiedItems": items.len(),
                })),
            actor,
            ctx,
            now,
        );
        let saved = self.store.insert_invoice(invoice, items, log.clone()).await?;
        Self::count_audit(&log);

        info!(
            invoice_id = %saved.id,
            invoice_number = %saved.invoice_number,
            quote_id = ?saved.quote_id,
            "Invoice created"
        );
        Ok(saved)
    }

    pub async fn get_invoice(&self, id: Uuid) -> Result<Invoice, AppError> {
        self.store
            .get_invoice(id)
            .await?
            .ok_or_else(|| AppError::not_found("Invoice"))
    }

    #[instrument(skip(self, update, actor, ctx), fields(invoice_id = %id))]
    pub async fn update_invoice(
        &self,
        id: Uuid,
        update: UpdateInvoice,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> Result<Invoice, AppError> {
        ensure_unit_price("priceExcludingTax", update.price_excluding_tax)?;
        ensure_tax_rate(update.tax_rate)?;
        if let Some(service_id) = update.service_id {
            self.require_service(service_id).await?;
        }

        let before = self.get_invoice(id).await?;
        let now = Utc::now();
        let after = before.with_update(&update, now);

        let action = audit::update_action(before.status(), after.status(), InvoiceStatus::transition_action);
        let log = self.audit_log(
            AuditEvent::new(AuditEntityType::Invoice, id, action)
                .summary(format!("Facture {} modifiée", after.invoice_number))
                .changes(audit::diff(&before, &after)),
            actor,
            ctx,
            now,
        );
        let saved = self.store.update_invoice(after, log.clone()).await?;
        Self::count_audit(&log);
        Ok(saved)
    }

    // -------------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------------

    pub async fn list_items(&self, kind: DocumentKind, document_id: Uuid) -> Result<Vec<DocumentItem>, AppError> {
        self.require_document(kind, document_id).await?;
        self.store.list_items(kind, document_id).await
    }

    #[instrument(skip(self, draft, actor, ctx), fields(kind = kind.as_str(), document_id = %document_id))]
    pub async fn add_item(
        &self,
        kind: DocumentKind,
        document_id: Uuid,
        draft: ItemDraft,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> Result<DocumentItem, AppError> {
        let input = validate_item_draft(kind, document_id, draft)?;
        self.require_document(kind, document_id).await?;

        let position = match input.position {
            Some(position) => position,
            None => self
                .store
                .list_items(kind, document_id)
                .await?
                .iter()
                .map(|item| item.position + 1)
                .max()
                .unwrap_or(0),
        };

        let now = Utc::now();
        let item = DocumentItem::new(
            document_id,
            input.description,
            input.quantity,
            input.unit_price_excluding_tax,
            input.tax_rate,
            position,
            now,
        );

        let log = self.audit_log(
            AuditEvent::new(kind.audit_entity(), document_id, AuditAction::Updated)
                .summary(format!("Ligne ajoutée : {}", item.description))
                .metadata(json!({ "itemId": item.id, "operation": "item_added" }))
                .changes(audit::diff_snapshots(&json!({}), &audit::snapshot(&item))),
            actor,
            ctx,
            now,
        );
        let saved = self.store.insert_item(kind, item, log.clone()).await?;
        Self::count_audit(&log);
        Ok(saved)
    }

    #[instrument(skip(self, update, actor, ctx), fields(kind = kind.as_str(), item_id = %item_id))]
    pub async fn update_item(
        &self,
        kind: DocumentKind,
        item_id: Uuid,
        update: UpdateDocumentItem,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> Result<DocumentItem, AppError> {
        if let Some(description) = &update.description {
            if description.trim().is_empty() {
                return Err(required_field("description"));
            }
        }
        ensure_quantity(update.quantity)?;
        ensure_unit_price("unitPriceExcludingTax", update.unit_price_excluding_tax)?;
        ensure_tax_rate(update.tax_rate)?;

        let before = self
            .store
            .get_item(kind, item_id)
            .await?
            .ok_or_else(|| AppError::not_found("Item"))?;

        let update = UpdateDocumentItem {
            description: update.description.map(|d| d.trim().to_string()),
            ..update
        };
        let now = Utc::now();
        let after = before.with_update(&update, now);

        let log = self.audit_log(
            AuditEvent::new(kind.audit_entity(), before.document_id, AuditAction::Updated)
                .summary(format!("Ligne modifiée : {}", after.description))
                .metadata(json!({ "itemId": item_id, "operation": "item_updated" }))
                .changes(audit::diff(&before, &after)),
            actor,
            ctx,
            now,
        );
        let saved = self.store.update_item(kind, after, log.clone()).await?;
        Self::count_audit(&log);
        Ok(saved)
    }

    #[instrument(skip(self, actor, ctx), fields(kind = kind.as_str(), item_id = %item_id))]
    pub async fn delete_item(
        &self,
        kind: DocumentKind,
        item_id: Uuid,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> Result<(), AppError> {
        let item = self
            .store
            .get_item(kind, item_id)
            .await?
            .ok_or_else(|| AppError::not_found("Item"))?;

        let now = Utc::now();
        let log = self.audit_log(
            AuditEvent::new(kind.audit_entity(), item.document_id, AuditAction::Updated)
                .summary(format!("Ligne supprimée : {}", item.description))
                .metadata(json!({ "itemId": item_id, "operation": "item_deleted" }))
                .changes(audit::diff_snapshots(&audit::snapshot(&item), &json!({}))),
            actor,
            ctx,
            now,
        );
        self.store.delete_item(kind, item_id, log.clone()).await?;
        Self::count_audit(&log);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Documents
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(kind = kind.as_str(), document_id = %id))]
    pub async fn document_bundle(&self, kind: DocumentKind, id: Uuid) -> Result<DocumentBundle, AppError> {
        let settings = self.store.get_settings().await?;
        let items = self.store.list_items(kind, id).await?;

        match kind {
            DocumentKind::Quote => {
                let quote = self.get_quote(id).await?;
                let client = self.require_client(quote.client_id).await?;
                let service = self.optional_service(quote.service_id).await?;
                let totals = DocumentLines::resolve(items.clone(), quote.single_line(service.as_ref())).totals();
                Ok(DocumentBundle {
                    kind,
                    document: BundleDocument::Quote(quote),
                    client,
                    service,
                    quote: None,
                    items,
                    settings,
                    totals,
                })
            }
            DocumentKind::Invoice => {
                let invoice = self.get_invoice(id).await?;
                let client = self.require_client(invoice.client_id).await?;
                let quote = match invoice.quote_id {
                    Some(quote_id) => self.store.get_quote(quote_id).await?,
                    None => None,
                };
                let service = self.optional_service(invoice.service_id).await?;
                let totals = DocumentLines::resolve(
                    items.clone(),
                    invoice.single_line(quote.as_ref(), service.as_ref()),
                )
                .totals();
                Ok(DocumentBundle {
                    kind,
                    document: BundleDocument::Invoice(invoice),
                    client,
                    service,
                    quote,
                    items,
                    settings,
                    totals,
                })
            }
        }
    }

    /// Renders the quote or invoice PDF. A missing or broken logo falls back
    /// to the company name.
    #[instrument(skip(self), fields(kind = kind.as_str(), document_id = %id))]
    pub async fn render_document(&self, kind: DocumentKind, id: Uuid) -> Result<RenderedDocument, AppError> {
        let bundle = self.document_bundle(kind, id).await?;
        let logo_source = bundle.settings.as_ref().and_then(|s| s.logo_url.clone());
        let logo = self.logo_loader.load(logo_source.as_deref()).await;
        let filename = format!("{}.pdf", bundle.number());

        let result = tokio::task::spawn_blocking(move || match &bundle.document {
            BundleDocument::Quote(quote) => pdf::render_quote_pdf(
                quote,
                &bundle.client,
                bundle.service.as_ref(),
                bundle.items.clone(),
                bundle.settings.as_ref(),
                logo,
            ),
            BundleDocument::Invoice(invoice) => pdf::render_invoice_pdf(
                invoice,
                &bundle.client,
                bundle.quote.as_ref(),
                bundle.service.as_ref(),
                bundle.items.clone(),
                bundle.settings.as_ref(),
                logo,
            ),
        })
        .await;

        let bytes = finish_render(kind, "document", result)?;
        Ok(RenderedDocument { filename, bytes })
    }

    /// Renders the five-label QR sheet of a quote or invoice.
    #[instrument(skip(self), fields(kind = kind.as_str(), document_id = %id))]
    pub async fn render_labels(&self, kind: DocumentKind, id: Uuid) -> Result<RenderedDocument, AppError> {
        let number = self.document_number_of(kind, id).await?;
        let filename = format!("{}-etiquettes.pdf", number);

        let result = tokio::task::spawn_blocking(move || pdf::render_label_sheet(&number, kind)).await;

        let bytes = finish_render(kind, "labels", result)?;
        Ok(RenderedDocument { filename, bytes })
    }

    pub async fn label_qr(&self, kind: DocumentKind, id: Uuid, code: &str) -> Result<LabelQr, AppError> {
        let position = LabelPosition::from_code(code)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown label position: {}", code)))?;
        let number = self.document_number_of(kind, id).await?;
        let png_base64 = pdf::label_qr_png(&number, position)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to generate document: {}", e)))?;
        Ok(LabelQr {
            position,
            code: position.code(),
            payload: position.payload(&number),
            png_base64,
        })
    }

    async fn document_number_of(&self, kind: DocumentKind, id: Uuid) -> Result<String, AppError> {
        match kind {
            DocumentKind::Quote => Ok(self.get_quote(id).await?.reference),
            DocumentKind::Invoice => Ok(self.get_invoice(id).await?.invoice_number),
        }
    }

    // -------------------------------------------------------------------------
    // Catalog and workflows
    // -------------------------------------------------------------------------

    pub async fn services_with_workflows(&self) -> Result<Vec<ServiceWithWorkflow>, AppError> {
        self.store.list_services_with_workflows().await
    }

    /// Replaces the service's workflow. Tasks already instantiated from the
    /// previous steps keep their copied text.
    #[instrument(skip(self, draft, actor, ctx), fields(service_id = %service_id, steps = draft.steps.len()))]
    pub async fn replace_workflow(
        &self,
        service_id: Uuid,
        draft: WorkflowDraft,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> Result<WorkflowWithSteps, AppError> {
        if let Some(index) = draft.steps.iter().position(|s| s.title.trim().is_empty()) {
            let mut errors = ValidationErrors::new();
            let mut error = ValidationError::new("required");
            error.message = Some(format!("step {} has no title", index + 1).into());
            errors.add("steps", error);
            return Err(AppError::ValidationError(errors));
        }

        let service = self.require_service(service_id).await?;
        let existing = self.store.get_workflow_for_service(service_id).await?;
        let now = Utc::now();

        let name = draft
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .or_else(|| existing.as_ref().map(|w| w.workflow.name.clone()))
            .unwrap_or_else(|| service.name.clone());
        let description = draft
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let workflow = match &existing {
            Some(current) => Workflow {
                name,
                description,
                updated_at: now,
                ..current.workflow.clone()
            },
            None => Workflow {
                id: Uuid::new_v4(),
                service_id,
                name,
                description,
                created_at: now,
                updated_at: now,
            },
        };
        let steps = workflow::build_steps(workflow.id, &draft.steps);
        let next = WorkflowWithSteps::new(workflow, steps);

        let (action, previous) = match &existing {
            Some(current) => (AuditAction::Updated, audit::snapshot(current)),
            None => (AuditAction::Created, json!({})),
        };
        let log = self.audit_log(
            AuditEvent::new(AuditEntityType::Workflow, next.workflow.id, action)
                .summary(format!("Workflow du service {} enregistré", service.name))
                .metadata(json!({ "serviceId": service_id, "stepCount": next.steps.len() }))
                .changes(audit::diff_snapshots(&previous, &audit::snapshot(&next))),
            actor,
            ctx,
            now,
        );
        let saved = self.store.replace_workflow(next, log.clone()).await?;
        Self::count_audit(&log);
        Ok(saved)
    }

    // -------------------------------------------------------------------------
    // Reservations and workshop tasks
    // -------------------------------------------------------------------------

    /// Confirms a reservation and, the first time only, creates one task per
    /// workflow step of its service.
    #[instrument(skip(self, actor, ctx), fields(reservation_id = %id))]
    pub async fn confirm_reservation(
        &self,
        id: Uuid,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> Result<ConfirmedReservation, AppError> {
        let before = self
            .store
            .get_reservation(id)
            .await?
            .ok_or_else(|| AppError::not_found("Reservation"))?;

        let now = Utc::now();
        let mut after = before.clone();
        if after.status() != Some(ReservationStatus::Confirmed) {
            after.status = ReservationStatus::Confirmed.as_str().to_string();
            after.updated_at = now;
        }

        let tasks = match self.store.get_workflow_for_service(before.service_id).await? {
            Some(workflow) => workflow::instantiate_tasks(id, &workflow, now),
            None => {
                warn!(service_id = %before.service_id, "Service has no workflow, no tasks created");
                Vec::new()
            }
        };

        let log = self.audit_log(
            AuditEvent::new(AuditEntityType::Reservation, id, AuditAction::Confirmed)
                .summary("Réservation confirmée")
                .metadata(json!({ "serviceId": before.service_id, "workflowSteps": tasks.len() }))
                .changes(audit::diff(&before, &after)),
            actor,
            ctx,
            now,
        );
        let (reservation, tasks) = self.store.confirm_reservation(after, tasks, log.clone()).await?;
        Self::count_audit(&log);

        Ok(ConfirmedReservation {
            reservation,
            board: TaskBoard::new(tasks),
        })
    }

    pub async fn reservation_tasks(&self, reservation_id: Uuid) -> Result<TaskBoard, AppError> {
        self.store
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| AppError::not_found("Reservation"))?;
        Ok(TaskBoard::new(self.store.list_tasks(reservation_id).await?))
    }

    pub async fn toggle_task(&self, id: Uuid, actor: &Actor, ctx: &RequestContext) -> Result<WorkshopTask, AppError> {
        self.change_task(id, actor, ctx, workflow::toggle).await
    }

    pub async fn set_task_comment(
        &self,
        id: Uuid,
        comment: Option<String>,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> Result<WorkshopTask, AppError> {
        self.change_task(id, actor, ctx, |task, now| workflow::set_comment(task, comment, now))
            .await
    }

    pub async fn patch_task(
        &self,
        id: Uuid,
        patch: TaskPatch,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> Result<WorkshopTask, AppError> {
        if patch.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Nothing to update: provide isCompleted and/or comment"
            )));
        }
        self.change_task(id, actor, ctx, |task, now| workflow::apply_patch(task, &patch, now))
            .await
    }

    #[instrument(skip(self, actor, ctx, change), fields(task_id = %id))]
    async fn change_task(
        &self,
        id: Uuid,
        actor: &Actor,
        ctx: &RequestContext,
        change: impl FnOnce(&WorkshopTask, DateTime<Utc>) -> WorkshopTask,
    ) -> Result<WorkshopTask, AppError> {
        let before = self
            .store
            .get_task(id)
            .await?
            .ok_or_else(|| AppError::not_found("Task"))?;

        let now = Utc::now();
        let after = change(&before, now);
        let transition = TaskTransition::between(&before, &after);
        let action = match transition {
            TaskTransition::Completed => AuditAction::Completed,
            _ => AuditAction::Updated,
        };

        let log = self.audit_log(
            AuditEvent::new(AuditEntityType::WorkshopTask, id, action)
                .summary(format!("Étape {} : {}", after.step_number, after.title))
                .metadata(json!({
                    "reservationId": after.reservation_id,
                    "transition": transition.as_str(),
                }))
                .changes(audit::diff(&before, &after)),
            actor,
            ctx,
            now,
        );
        let saved = self.store.update_task(after, log.clone()).await?;
        Self::count_audit(&log);
        TASK_TRANSITIONS_TOTAL
            .with_label_values(&[transition.as_str()])
            .inc();

        info!(
            task_id = %saved.id,
            transition = transition.as_str(),
            "Workshop task updated"
        );
        Ok(saved)
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    pub async fn settings(&self) -> Result<ApplicationSettings, AppError> {
        Ok(self.store.get_settings().await?.unwrap_or_default())
    }

    #[instrument(skip(self, update))]
    pub async fn update_settings(&self, update: UpdateSettings) -> Result<ApplicationSettings, AppError> {
        let current = self.settings().await?;
        let next = current.with_update(&update, Utc::now());
        self.store.save_settings(next).await
    }

    // -------------------------------------------------------------------------
    // Audit
    // -------------------------------------------------------------------------

    /// Records an event reported by a collaborator outside this service.
    #[instrument(skip(self, event, actor, ctx), fields(entity_type = event.entity_type.as_str(), action = event.action.as_str()))]
    pub async fn record_audit_event(
        &self,
        event: AuditEvent,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> Result<AuditLog, AppError> {
        let log = self.audit_log(event, actor, ctx, Utc::now());
        let saved = self.store.insert_audit_log(log).await?;
        Self::count_audit(&saved);
        Ok(saved)
    }

    /// Newest first. The limit is clamped to `1..=200` and the offset to
    /// non-negative values.
    pub async fn list_audit_logs(&self, filter: AuditLogFilter) -> Result<(Vec<AuditLog>, i64), AppError> {
        let filter = AuditLogFilter {
            limit: filter.limit.clamp(1, MAX_AUDIT_LIMIT),
            offset: filter.offset.max(0),
            ..filter
        };
        self.store.list_audit_logs(&filter).await
    }
}

fn entity_label(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Quote => "Quote",
        DocumentKind::Invoice => "Invoice",
    }
}

fn required_field(field: &'static str) -> AppError {
    let mut errors = ValidationErrors::new();
    errors.add(field, ValidationError::new("required"));
    AppError::ValidationError(errors)
}

fn ensure_non_negative(field: &str, value: Option<Decimal>) -> Result<(), AppError> {
    match value {
        Some(v) if v.is_sign_negative() && !v.is_zero() => Err(AppError::BadRequest(anyhow::anyhow!(
            "{} must not be negative",
            field
        ))),
        _ => Ok(()),
    }
}

/// Rejects negative amounts and amounts above `max`.
fn ensure_amount(field: &str, value: Option<Decimal>, max: Decimal) -> Result<(), AppError> {
    ensure_non_negative(field, value)?;
    match value {
        Some(v) if v > max => Err(AppError::BadRequest(anyhow::anyhow!(
            "{} must not exceed {}",
            field,
            max
        ))),
        _ => Ok(()),
    }
}

fn ensure_quantity(value: Option<Decimal>) -> Result<(), AppError> {
    ensure_amount("quantity", value, MAX_QUANTITY)
}

fn ensure_unit_price(field: &str, value: Option<Decimal>) -> Result<(), AppError> {
    ensure_amount(field, value, MAX_UNIT_PRICE)
}

fn ensure_tax_rate(value: Option<Decimal>) -> Result<(), AppError> {
    ensure_amount("taxRate", value, MAX_TAX_RATE)
}

/// Checks that description, quantity and unit price are present and that every
/// amount lies between zero and its upper bound. The tax rate defaults to 20 %.
pub fn validate_item_draft(
    kind: DocumentKind,
    document_id: Uuid,
    draft: ItemDraft,
) -> Result<CreateDocumentItem, AppError> {
    let mut errors = ValidationErrors::new();
    let description = draft
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    if description.is_none() {
        errors.add("description", ValidationError::new("required"));
    }
    if draft.quantity.is_none() {
        errors.add("quantity", ValidationError::new("required"));
    }
    if draft.unit_price_excluding_tax.is_none() {
        errors.add("unitPriceExcludingTax", ValidationError::new("required"));
    }

    match (description, draft.quantity, draft.unit_price_excluding_tax) {
        (Some(description), Some(quantity), Some(unit_price)) => {
            ensure_quantity(Some(quantity))?;
            ensure_unit_price("unitPriceExcludingTax", Some(unit_price))?;
            ensure_tax_rate(draft.tax_rate)?;
            Ok(CreateDocumentItem {
                kind,
                document_id,
                description,
                quantity,
                unit_price_excluding_tax: unit_price,
                tax_rate: draft.tax_rate.unwrap_or_else(crate::pricing::default_tax_rate),
                position: draft.position,
            })
        }
        _ => Err(AppError::ValidationError(errors)),
    }
}

fn finish_render(
    kind: DocumentKind,
    output: &str,
    result: Result<Result<Vec<u8>, PdfError>, tokio::task::JoinError>,
) -> Result<Vec<u8>, AppError> {
    let outcome = match result {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(anyhow::anyhow!("Failed to generate document: {}", e)),
        Err(e) => Err(anyhow::anyhow!("Render task failed: {}", e)),
    };
    let label = if outcome.is_ok() { "success" } else { "failure" };
    DOCUMENTS_RENDERED_TOTAL
        .with_label_values(&[&format!("{}_{}", kind.as_str(), output), label])
        .inc();
    outcome.map_err(AppError::InternalError)
}
