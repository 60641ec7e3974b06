//! Process-local store for the `memory` backend and for tests.
//!
//! All tables sit behind one mutex, so every mutation and its audit entry are
//! applied under a single lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    ApplicationSettings, AuditLog, AuditLogFilter, Client, DocumentItem, DocumentKind, Invoice,
    Quote, Reservation, Service, ServiceWithWorkflow, WorkflowWithSteps, WorkshopTask,
};
use crate::services::store::Store;
use crate::workflow::sort_tasks;

#[derive(Default)]
struct Tables {
    clients: HashMap<Uuid, Client>,
    services: HashMap<Uuid, Service>,
    workflows: HashMap<Uuid, WorkflowWithSteps>,
    sequences: HashMap<(DocumentKind, i32), i64>,
    quotes: HashMap<Uuid, Quote>,
    invoices: HashMap<Uuid, Invoice>,
    quote_items: HashMap<Uuid, DocumentItem>,
    invoice_items: HashMap<Uuid, DocumentItem>,
    reservations: HashMap<Uuid, Reservation>,
    tasks: HashMap<Uuid, WorkshopTask>,
    settings: Option<ApplicationSettings>,
    audit_logs: Vec<AuditLog>,
}

impl Tables {
    fn items(&self, kind: DocumentKind) -> &HashMap<Uuid, DocumentItem> {
        match kind {
            DocumentKind::Quote => &self.quote_items,
            DocumentKind::Invoice => &self.invoice_items,
        }
    }

    fn items_mut(&mut self, kind: DocumentKind) -> &mut HashMap<Uuid, DocumentItem> {
        match kind {
            DocumentKind::Quote => &mut self.quote_items,
            DocumentKind::Invoice => &mut self.invoice_items,
        }
    }

    fn document_exists(&self, kind: DocumentKind, id: Uuid) -> bool {
        match kind {
            DocumentKind::Quote => self.quotes.contains_key(&id),
            DocumentKind::Invoice => self.invoices.contains_key(&id),
        }
    }
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Memory store mutex poisoned: {}", e)))
    }

    // Seeding for records owned by collaborators outside this service.

    pub fn insert_client(&self, client: Client) -> Result<(), AppError> {
        self.lock()?.clients.insert(client.id, client);
        Ok(())
    }

    pub fn insert_service(&self, service: Service) -> Result<(), AppError> {
        self.lock()?.services.insert(service.id, service);
        Ok(())
    }

    pub fn insert_workflow(&self, workflow: WorkflowWithSteps) -> Result<(), AppError> {
        self.lock()?
            .workflows
            .insert(workflow.workflow.service_id, workflow);
        Ok(())
    }

    pub fn insert_reservation(&self, reservation: Reservation) -> Result<(), AppError> {
        self.lock()?.reservations.insert(reservation.id, reservation);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, AppError> {
        Ok(self.lock()?.clients.get(&id).cloned())
    }

    async fn get_service(&self, id: Uuid) -> Result<Option<Service>, AppError> {
        Ok(self.lock()?.services.get(&id).cloned())
    }

    async fn list_services_with_workflows(&self) -> Result<Vec<ServiceWithWorkflow>, AppError> {
        let tables = self.lock()?;
        let mut services: Vec<ServiceWithWorkflow> = tables
            .services
            .values()
            .map(|service| ServiceWithWorkflow {
                workflow: tables.workflows.get(&service.id).cloned(),
                service: service.clone(),
            })
            .collect();
        services.sort_by(|a, b| a.service.name.cmp(&b.service.name));
        Ok(services)
    }

    async fn get_workflow_for_service(
        &self,
        service_id: Uuid,
    ) -> Result<Option<WorkflowWithSteps>, AppError> {
        Ok(self.lock()?.workflows.get(&service_id).cloned())
    }

    async fn replace_workflow(
        &self,
        workflow: WorkflowWithSteps,
        audit: AuditLog,
    ) -> Result<WorkflowWithSteps, AppError> {
        let mut tables = self.lock()?;
        let mut saved = workflow;
        if let Some(existing) = tables.workflows.get(&saved.workflow.service_id) {
            saved.workflow.id = existing.workflow.id;
            saved.workflow.created_at = existing.workflow.created_at;
            let workflow_id = saved.workflow.id;
            for step in &mut saved.steps {
                step.workflow_id = workflow_id;
            }
        }
        tables
            .workflows
            .insert(saved.workflow.service_id, saved.clone());
        tables.audit_logs.push(audit);
        Ok(saved)
    }

    async fn next_document_sequence(&self, kind: DocumentKind, year: i32) -> Result<i64, AppError> {
        let mut tables = self.lock()?;
        let value = tables.sequences.entry((kind, year)).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn insert_quote(&self, quote: Quote, audit: AuditLog) -> Result<Quote, AppError> {
        let mut tables = self.lock()?;
        if tables.quotes.values().any(|q| q.reference == quote.reference) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Quote reference {} already exists",
                quote.reference
            )));
        }
        tables.quotes.insert(quote.id, quote.clone());
        tables.audit_logs.push(audit);
        Ok(quote)
    }

    async fn get_quote(&self, id: Uuid) -> Result<Option<Quote>, AppError> {
        Ok(self.lock()?.quotes.get(&id).cloned())
    }

    async fn update_quote(&self, quote: Quote, audit: AuditLog) -> Result<Quote, AppError> {
        let mut tables = self.lock()?;
        let slot = tables
            .quotes
            .get_mut(&quote.id)
            .ok_or_else(|| AppError::not_found("Quote"))?;
        *slot = quote.clone();
        tables.audit_logs.push(audit);
        Ok(quote)
    }

    async fn insert_invoice(
        &self,
        invoice: Invoice,
        items: Vec<DocumentItem>,
        audit: AuditLog,
    ) -> Result<Invoice, AppError> {
        let mut tables = self.lock()?;
        if tables
            .invoices
            .values()
            .any(|i| i.invoice_number == invoice.invoice_number)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice number {} already exists",
                invoice.invoice_number
            )));
        }
        tables.invoices.insert(invoice.id, invoice.clone());
        for item in items {
            tables.invoice_items.insert(item.id, item);
        }
        tables.audit_logs.push(audit);
        Ok(invoice)
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self.lock()?.invoices.get(&id).cloned())
    }

    async fn update_invoice(&self, invoice: Invoice, audit: AuditLog) -> Result<Invoice, AppError> {
        let mut tables = self.lock()?;
        let slot = tables
            .invoices
            .get_mut(&invoice.id)
            .ok_or_else(|| AppError::not_found("Invoice"))?;
        *slot = invoice.clone();
        tables.audit_logs.push(audit);
        Ok(invoice)
    }

    async fn list_items(
        &self,
        kind: DocumentKind,
        document_id: Uuid,
    ) -> Result<Vec<DocumentItem>, AppError> {
        let tables = self.lock()?;
        let mut items: Vec<DocumentItem> = tables
            .items(kind)
            .values()
            .filter(|item| item.document_id == document_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(items)
    }

    async fn get_item(&self, kind: DocumentKind, id: Uuid) -> Result<Option<DocumentItem>, AppError> {
        Ok(self.lock()?.items(kind).get(&id).cloned())
    }

    async fn insert_item(
        &self,
        kind: DocumentKind,
        item: DocumentItem,
        audit: AuditLog,
    ) -> Result<DocumentItem, AppError> {
        let mut tables = self.lock()?;
        if !tables.document_exists(kind, item.document_id) {
            return Err(AppError::not_found(kind.as_str()));
        }
        tables.items_mut(kind).insert(item.id, item.clone());
        tables.audit_logs.push(audit);
        Ok(item)
    }

    async fn update_item(
        &self,
        kind: DocumentKind,
        item: DocumentItem,
        audit: AuditLog,
    ) -> Result<DocumentItem, AppError> {
        let mut tables = self.lock()?;
        let slot = tables
            .items_mut(kind)
            .get_mut(&item.id)
            .ok_or_else(|| AppError::not_found("Item"))?;
        *slot = item.clone();
        tables.audit_logs.push(audit);
        Ok(item)
    }

    async fn delete_item(&self, kind: DocumentKind, id: Uuid, audit: AuditLog) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        tables
            .items_mut(kind)
            .remove(&id)
            .ok_or_else(|| AppError::not_found("Item"))?;
        tables.audit_logs.push(audit);
        Ok(())
    }

    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, AppError> {
        Ok(self.lock()?.reservations.get(&id).cloned())
    }

    async fn confirm_reservation(
        &self,
        reservation: Reservation,
        tasks: Vec<WorkshopTask>,
        audit: AuditLog,
    ) -> Result<(Reservation, Vec<WorkshopTask>), AppError> {
        let mut tables = self.lock()?;
        let slot = tables
            .reservations
            .get_mut(&reservation.id)
            .ok_or_else(|| AppError::not_found("Reservation"))?;
        *slot = reservation.clone();

        let has_tasks = tables
            .tasks
            .values()
            .any(|task| task.reservation_id == reservation.id);
        if !has_tasks {
            for task in tasks {
                tables.tasks.insert(task.id, task);
            }
        }
        tables.audit_logs.push(audit);

        let mut all_tasks: Vec<WorkshopTask> = tables
            .tasks
            .values()
            .filter(|task| task.reservation_id == reservation.id)
            .cloned()
            .collect();
        sort_tasks(&mut all_tasks);
        Ok((reservation, all_tasks))
    }

    async fn list_tasks(&self, reservation_id: Uuid) -> Result<Vec<WorkshopTask>, AppError> {
        let mut tasks: Vec<WorkshopTask> = self
            .lock()?
            .tasks
            .values()
            .filter(|task| task.reservation_id == reservation_id)
            .cloned()
            .collect();
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<WorkshopTask>, AppError> {
        Ok(self.lock()?.tasks.get(&id).cloned())
    }

    async fn update_task(&self, task: WorkshopTask, audit: AuditLog) -> Result<WorkshopTask, AppError> {
        let mut tables = self.lock()?;
        let slot = tables
            .tasks
            .get_mut(&task.id)
            .ok_or_else(|| AppError::not_found("Task"))?;
        *slot = task.clone();
        tables.audit_logs.push(audit);
        Ok(task)
    }

    async fn get_settings(&self) -> Result<Option<ApplicationSettings>, AppError> {
        Ok(self.lock()?.settings.clone())
    }

    async fn save_settings(
        &self,
        settings: ApplicationSettings,
    ) -> Result<ApplicationSettings, AppError> {
        self.lock()?.settings = Some(settings.clone());
        Ok(settings)
    }

    async fn insert_audit_log(&self, log: AuditLog) -> Result<AuditLog, AppError> {
        self.lock()?.audit_logs.push(log.clone());
        Ok(log)
    }

    async fn list_audit_logs(&self, filter: &AuditLogFilter) -> Result<(Vec<AuditLog>, i64), AppError> {
        let tables = self.lock()?;
        // Appended in write order; newest first is the reverse, with the
        // timestamp as the primary key.
        let mut matching: Vec<&AuditLog> = tables
            .audit_logs
            .iter()
            .rev()
            .filter(|log| filter.matches(log))
            .collect();
        matching.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

        let total = matching.len() as i64;
        let logs = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((logs, total))
    }
}
