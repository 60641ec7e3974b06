//! Persistence seam.
//!
//! Every mutation that is audited takes its [`AuditLog`] and writes it in the
//! same transaction, so an entity change and its audit entry land together
//! or not at all.

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    ApplicationSettings, AuditLog, AuditLogFilter, Client, DocumentItem, DocumentKind, Invoice,
    Quote, Reservation, Service, ServiceWithWorkflow, WorkflowWithSteps, WorkshopTask,
};

#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    // Clients and catalog
    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, AppError>;
    async fn get_service(&self, id: Uuid) -> Result<Option<Service>, AppError>;
    async fn list_services_with_workflows(&self) -> Result<Vec<ServiceWithWorkflow>, AppError>;
    async fn get_workflow_for_service(
        &self,
        service_id: Uuid,
    ) -> Result<Option<WorkflowWithSteps>, AppError>;
    /// Replaces the service's workflow and all of its steps.
    async fn replace_workflow(
        &self,
        workflow: WorkflowWithSteps,
        audit: AuditLog,
    ) -> Result<WorkflowWithSteps, AppError>;

    // Quotes and invoices
    /// Next number in the per-kind, per-year sequence, starting at 1.
    async fn next_document_sequence(&self, kind: DocumentKind, year: i32) -> Result<i64, AppError>;
    async fn insert_quote(&self, quote: Quote, audit: AuditLog) -> Result<Quote, AppError>;
    async fn get_quote(&self, id: Uuid) -> Result<Option<Quote>, AppError>;
    async fn update_quote(&self, quote: Quote, audit: AuditLog) -> Result<Quote, AppError>;
    /// Inserts the invoice together with its initial items.
    async fn insert_invoice(
        &self,
        invoice: Invoice,
        items: Vec<DocumentItem>,
        audit: AuditLog,
    ) -> Result<Invoice, AppError>;
    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError>;
    async fn update_invoice(&self, invoice: Invoice, audit: AuditLog) -> Result<Invoice, AppError>;

    // Items
    /// Items ordered by position, then creation time.
    async fn list_items(
        &self,
        kind: DocumentKind,
        document_id: Uuid,
    ) -> Result<Vec<DocumentItem>, AppError>;
    async fn get_item(&self, kind: DocumentKind, id: Uuid) -> Result<Option<DocumentItem>, AppError>;
    async fn insert_item(
        &self,
        kind: DocumentKind,
        item: DocumentItem,
        audit: AuditLog,
    ) -> Result<DocumentItem, AppError>;
    async fn update_item(
        &self,
        kind: DocumentKind,
        item: DocumentItem,
        audit: AuditLog,
    ) -> Result<DocumentItem, AppError>;
    async fn delete_item(&self, kind: DocumentKind, id: Uuid, audit: AuditLog) -> Result<(), AppError>;

    // Reservations and workshop tasks
    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, AppError>;
    /// Saves the confirmed reservation and inserts `tasks` only when the
    /// reservation has none yet. Returns the reservation's tasks afterwards.
    async fn confirm_reservation(
        &self,
        reservation: Reservation,
        tasks: Vec<WorkshopTask>,
        audit: AuditLog,
    ) -> Result<(Reservation, Vec<WorkshopTask>), AppError>;
    async fn list_tasks(&self, reservation_id: Uuid) -> Result<Vec<WorkshopTask>, AppError>;
    async fn get_task(&self, id: Uuid) -> Result<Option<WorkshopTask>, AppError>;
    async fn update_task(&self, task: WorkshopTask, audit: AuditLog) -> Result<WorkshopTask, AppError>;

    // Settings
    async fn get_settings(&self) -> Result<Option<ApplicationSettings>, AppError>;
    async fn save_settings(
        &self,
        settings: ApplicationSettings,
    ) -> Result<ApplicationSettings, AppError>;

    // Audit
    async fn insert_audit_log(&self, log: AuditLog) -> Result<AuditLog, AppError>;
    /// Newest first, with the total matching the filter.
    async fn list_audit_logs(&self, filter: &AuditLogFilter) -> Result<(Vec<AuditLog>, i64), AppError>;
}
