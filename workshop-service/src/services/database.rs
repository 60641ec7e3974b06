//! PostgreSQL store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    ApplicationSettings, AuditLog, AuditLogChange, AuditLogFilter, Client, DocumentItem,
    DocumentKind, Invoice, Quote, Reservation, Service, ServiceWithWorkflow, Workflow,
    WorkflowStep, WorkflowWithSteps, WorkshopTask,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::Store;

const QUOTE_COLUMNS: &str = "id, client_id, service_id, status, reference, wheel_count, diameter, \
    product_details, price_excluding_tax, tax_rate, tax_amount, quote_amount, valid_until, notes, \
    created_at, updated_at";

const INVOICE_COLUMNS: &str = "id, client_id, quote_id, service_id, status, invoice_number, \
    wheel_count, diameter, product_details, price_excluding_tax, tax_rate, tax_amount, amount, \
    due_date, notes, created_at, updated_at";

const TASK_COLUMNS: &str = "id, reservation_id, step_id, step_number, title, description, \
    is_completed, comment, completed_at, created_at, updated_at";

const SETTINGS_COLUMNS: &str = "company_name, address, postal_code, city, phone, email, website, \
    siret, tva_number, bank_name, iban, bic, logo_url, updated_at";

const AUDIT_COLUMNS: &str = "id, entity_type, entity_id, action, actor_id, actor_role, actor_name, \
    summary, metadata, ip_address, user_agent, occurred_at";

fn item_columns(kind: DocumentKind) -> String {
    format!(
        "id, {} AS document_id, description, quantity, unit_price_excluding_tax, tax_rate, \
         total_excluding_tax, tax_amount, total_including_tax, position, created_at, updated_at",
        kind.parent_column()
    )
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!("{}: {}", context, e))
        }
        _ => AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e)),
    }
}

/// Store backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[instrument(skip(database_url), fields(service = "workshop-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, AppError> {
        self.pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))
    }
}

async fn write_audit(tx: &mut Transaction<'_, Postgres>, log: &AuditLog) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, entity_type, entity_id, action, actor_id, actor_role,
            actor_name, summary, metadata, ip_address, user_agent, occurred_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(log.id)
    .bind(&log.entity_type)
    .bind(log.entity_id)
    .bind(&log.action)
    .bind(log.actor_id)
    .bind(&log.actor_role)
    .bind(&log.actor_name)
    .bind(&log.summary)
    .bind(&log.metadata)
    .bind(&log.ip_address)
    .bind(&log.user_agent)
    .bind(log.occurred_at)
    .execute(&mut **tx)
    .await
    .map_err(db_error("Failed to insert audit log"))?;

    for change in &log.changes {
        sqlx::query(
            r#"
            INSERT INTO audit_log_changes (id, audit_log_id, field, previous_value, new_value, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(change.id)
        .bind(change.audit_log_id)
        .bind(&change.field)
        .bind(&change.previous_value)
        .bind(&change.new_value)
        .bind(change.position)
        .execute(&mut **tx)
        .await
        .map_err(db_error("Failed to insert audit change"))?;
    }

    Ok(())
}

async fn write_item(
    tx: &mut Transaction<'_, Postgres>,
    kind: DocumentKind,
    item: &DocumentItem,
) -> Result<DocumentItem, AppError> {
    let query = format!(
        "INSERT INTO {} (id, {}, description, quantity, unit_price_excluding_tax, tax_rate, \
         total_excluding_tax, tax_amount, total_including_tax, position, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {}",
        kind.items_table(),
        kind.parent_column(),
        item_columns(kind)
    );
    sqlx::query_as::<_, DocumentItem>(&query)
        .bind(item.id)
        .bind(item.document_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price_excluding_tax)
        .bind(item.tax_rate)
        .bind(item.total_excluding_tax)
        .bind(item.tax_amount)
        .bind(item.total_including_tax)
        .bind(item.position)
        .bind(item.created_at)
        .bind(item.updated_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(db_error("Failed to insert item"))
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Clients and catalog
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(client_id = %id))]
    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["get_client"]).start_timer();
        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT id, email, first_name, last_name, company_name, siret, tva_number, phone,
                address, postal_code, city, role
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get client"))?;
        timer.observe_duration();
        Ok(client)
    }

    #[instrument(skip(self), fields(service_id = %id))]
    async fn get_service(&self, id: Uuid) -> Result<Option<Service>, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["get_service"]).start_timer();
        let service = sqlx::query_as::<_, Service>(
            r#"
            SELECT id, name, description, base_price, estimated_duration, category, is_active
            FROM services
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get service"))?;
        timer.observe_duration();
        Ok(service)
    }

    #[instrument(skip(self))]
    async fn list_services_with_workflows(&self) -> Result<Vec<ServiceWithWorkflow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_services_with_workflows"])
            .start_timer();

        let services = sqlx::query_as::<_, Service>(
            r#"
            SELECT id, name, description, base_price, estimated_duration, category, is_active
            FROM services
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list services"))?;

        let workflows = sqlx::query_as::<_, Workflow>(
            "SELECT id, service_id, name, description, created_at, updated_at FROM workflows",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list workflows"))?;

        let steps = sqlx::query_as::<_, WorkflowStep>(
            r#"
            SELECT id, workflow_id, step_number, title, description
            FROM workflow_steps
            ORDER BY workflow_id, step_number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list workflow steps"))?;

        timer.observe_duration();

        let mut steps_by_workflow: HashMap<Uuid, Vec<WorkflowStep>> = HashMap::new();
        for step in steps {
            steps_by_workflow.entry(step.workflow_id).or_default().push(step);
        }
        let mut workflow_by_service: HashMap<Uuid, WorkflowWithSteps> = workflows
            .into_iter()
            .map(|wf| {
                let steps = steps_by_workflow.remove(&wf.id).unwrap_or_default();
                (wf.service_id, WorkflowWithSteps::new(wf, steps))
            })
            .collect();

        Ok(services
            .into_iter()
            .map(|service| ServiceWithWorkflow {
                workflow: workflow_by_service.remove(&service.id),
                service,
            })
            .collect())
    }

    #[instrument(skip(self), fields(service_id = %service_id))]
    async fn get_workflow_for_service(
        &self,
        service_id: Uuid,
    ) -> Result<Option<WorkflowWithSteps>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_workflow_for_service"])
            .start_timer();

        let workflow = sqlx::query_as::<_, Workflow>(
            r#"
            SELECT id, service_id, name, description, created_at, updated_at
            FROM workflows
            WHERE service_id = $1
            "#,
        )
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get workflow"))?;

        let Some(workflow) = workflow else {
            timer.observe_duration();
            return Ok(None);
        };

        let steps = sqlx::query_as::<_, WorkflowStep>(
            r#"
            SELECT id, workflow_id, step_number, title, description
            FROM workflow_steps
            WHERE workflow_id = $1
            ORDER BY step_number ASC
            "#,
        )
        .bind(workflow.id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to get workflow steps"))?;

        timer.observe_duration();
        Ok(Some(WorkflowWithSteps::new(workflow, steps)))
    }

    #[instrument(skip(self, workflow, audit), fields(service_id = %workflow.workflow.service_id))]
    async fn replace_workflow(
        &self,
        workflow: WorkflowWithSteps,
        audit: AuditLog,
    ) -> Result<WorkflowWithSteps, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["replace_workflow"])
            .start_timer();
        let mut tx = self.begin().await?;

        let saved = sqlx::query_as::<_, Workflow>(
            r#"
            INSERT INTO workflows (id, service_id, name, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (service_id) DO UPDATE
            SET name = EXCLUDED.name, description = EXCLUDED.description, updated_at = EXCLUDED.updated_at
            RETURNING id, service_id, name, description, created_at, updated_at
            "#,
        )
        .bind(workflow.workflow.id)
        .bind(workflow.workflow.service_id)
        .bind(&workflow.workflow.name)
        .bind(&workflow.workflow.description)
        .bind(workflow.workflow.created_at)
        .bind(workflow.workflow.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to save workflow"))?;

        sqlx::query("DELETE FROM workflow_steps WHERE workflow_id = $1")
            .bind(saved.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to clear workflow steps"))?;

        let mut steps = Vec::with_capacity(workflow.steps.len());
        for step in &workflow.steps {
            let step = sqlx::query_as::<_, WorkflowStep>(
                r#"
                INSERT INTO workflow_steps (id, workflow_id, step_number, title, description)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, workflow_id, step_number, title, description
                "#,
            )
            .bind(step.id)
            .bind(saved.id)
            .bind(step.step_number)
            .bind(&step.title)
            .bind(&step.description)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("Failed to insert workflow step"))?;
            steps.push(step);
        }

        write_audit(&mut tx, &audit).await?;
        tx.commit().await.map_err(db_error("Failed to commit workflow"))?;
        timer.observe_duration();

        info!(workflow_id = %saved.id, steps = steps.len(), "Workflow replaced");
        Ok(WorkflowWithSteps::new(saved, steps))
    }

    // -------------------------------------------------------------------------
    // Quotes and invoices
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn next_document_sequence(&self, kind: DocumentKind, year: i32) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["next_document_sequence"])
            .start_timer();
        let (value,) = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO document_sequences (kind, year, last_value)
            VALUES ($1, $2, 1)
            ON CONFLICT (kind, year) DO UPDATE
            SET last_value = document_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(kind.as_str())
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to allocate document number"))?;
        timer.observe_duration();
        Ok(value)
    }

    #[instrument(skip(self, quote, audit), fields(quote_id = %quote.id))]
    async fn insert_quote(&self, quote: Quote, audit: AuditLog) -> Result<Quote, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["insert_quote"]).start_timer();
        let mut tx = self.begin().await?;

        let query = format!(
            "INSERT INTO quotes ({QUOTE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {QUOTE_COLUMNS}"
        );
        let saved = sqlx::query_as::<_, Quote>(&query)
            .bind(quote.id)
            .bind(quote.client_id)
            .bind(quote.service_id)
            .bind(&quote.status)
            .bind(&quote.reference)
            .bind(quote.wheel_count)
            .bind(&quote.diameter)
            .bind(&quote.product_details)
            .bind(quote.price_excluding_tax)
            .bind(quote.tax_rate)
            .bind(quote.tax_amount)
            .bind(quote.quote_amount)
            .bind(quote.valid_until)
            .bind(&quote.notes)
            .bind(quote.created_at)
            .bind(quote.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("Failed to insert quote"))?;

        write_audit(&mut tx, &audit).await?;
        tx.commit().await.map_err(db_error("Failed to commit quote"))?;
        timer.observe_duration();

        info!(quote_id = %saved.id, reference = %saved.reference, "Quote created");
        Ok(saved)
    }

    #[instrument(skip(self), fields(quote_id = %id))]
    async fn get_quote(&self, id: Uuid) -> Result<Option<Quote>, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["get_quote"]).start_timer();
        let query = format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1");
        let quote = sqlx::query_as::<_, Quote>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to get quote"))?;
        timer.observe_duration();
        Ok(quote)
    }

    #[instrument(skip(self, quote, audit), fields(quote_id = %quote.id))]
    async fn update_quote(&self, quote: Quote, audit: AuditLog) -> Result<Quote, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["update_quote"]).start_timer();
        let mut tx = self.begin().await?;

        let query = format!(
            "UPDATE quotes SET service_id = $2, status = $3, wheel_count = $4, diameter = $5, \
             product_details = $6, price_excluding_tax = $7, tax_rate = $8, tax_amount = $9, \
             quote_amount = $10, valid_until = $11, notes = $12, updated_at = $13 \
             WHERE id = $1 RETURNING {QUOTE_COLUMNS}"
        );
        let saved = sqlx::query_as::<_, Quote>(&query)
            .bind(quote.id)
            .bind(quote.service_id)
            .bind(&quote.status)
            .bind(quote.wheel_count)
            .bind(&quote.diameter)
            .bind(&quote.product_details)
            .bind(quote.price_excluding_tax)
            .bind(quote.tax_rate)
            .bind(quote.tax_amount)
            .bind(quote.quote_amount)
            .bind(quote.valid_until)
            .bind(&quote.notes)
            .bind(quote.updated_at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to update quote"))?
            .ok_or_else(|| AppError::not_found("Quote"))?;

        write_audit(&mut tx, &audit).await?;
        tx.commit().await.map_err(db_error("Failed to commit quote"))?;
        timer.observe_duration();
        Ok(saved)
    }

    #[instrument(skip(self, invoice, items, audit), fields(invoice_id = %invoice.id))]
    async fn insert_invoice(
        &self,
        invoice: Invoice,
        items: Vec<DocumentItem>,
        audit: AuditLog,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["insert_invoice"]).start_timer();
        let mut tx = self.begin().await?;

        let query = format!(
            "INSERT INTO invoices ({INVOICE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {INVOICE_COLUMNS}"
        );
        let saved = sqlx::query_as::<_, Invoice>(&query)
            .bind(invoice.id)
            .bind(invoice.client_id)
            .bind(invoice.quote_id)
            .bind(invoice.service_id)
            .bind(&invoice.status)
            .bind(&invoice.invoice_number)
            .bind(invoice.wheel_count)
            .bind(&invoice.diameter)
            .bind(&invoice.product_details)
            .bind(invoice.price_excluding_tax)
            .bind(invoice.tax_rate)
            .bind(invoice.tax_amount)
            .bind(invoice.amount)
            .bind(invoice.due_date)
            .bind(&invoice.notes)
            .bind(invoice.created_at)
            .bind(invoice.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("Failed to insert invoice"))?;

        for item in &items {
            write_item(&mut tx, DocumentKind::Invoice, item).await?;
        }

        write_audit(&mut tx, &audit).await?;
        tx.commit().await.map_err(db_error("Failed to commit invoice"))?;
        timer.observe_duration();

        info!(
            invoice_id = %saved.id,
            invoice_number = %saved.invoice_number,
            items = items.len(),
            "Invoice created"
        );
        Ok(saved)
    }

    #[instrument(skip(self), fields(invoice_id = %id))]
    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["get_invoice"]).start_timer();
        let query = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1");
        let invoice = sqlx::query_as::<_, Invoice>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to get invoice"))?;
        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self, invoice, audit), fields(invoice_id = %invoice.id))]
    async fn update_invoice(&self, invoice: Invoice, audit: AuditLog) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["update_invoice"]).start_timer();
        let mut tx = self.begin().await?;

        let query = format!(
            "UPDATE invoices SET service_id = $2, status = $3, wheel_count = $4, diameter = $5, \
             product_details = $6, price_excluding_tax = $7, tax_rate = $8, tax_amount = $9, \
             amount = $10, due_date = $11, notes = $12, updated_at = $13 \
             WHERE id = $1 RETURNING {INVOICE_COLUMNS}"
        );
        let saved = sqlx::query_as::<_, Invoice>(&query)
            .bind(invoice.id)
            .bind(invoice.service_id)
            .bind(&invoice.status)
            .bind(invoice.wheel_count)
            .bind(&invoice.diameter)
            .bind(&invoice.product_details)
            .bind(invoice.price_excluding_tax)
            .bind(invoice.tax_rate)
            .bind(invoice.tax_amount)
            .bind(invoice.amount)
            .bind(invoice.due_date)
            .bind(&invoice.notes)
            .bind(invoice.updated_at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to update invoice"))?
            .ok_or_else(|| AppError::not_found("Invoice"))?;

        write_audit(&mut tx, &audit).await?;
        tx.commit().await.map_err(db_error("Failed to commit invoice"))?;
        timer.observe_duration();
        Ok(saved)
    }

    // -------------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(kind = kind.as_str(), document_id = %document_id))]
    async fn list_items(
        &self,
        kind: DocumentKind,
        document_id: Uuid,
    ) -> Result<Vec<DocumentItem>, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["list_items"]).start_timer();
        let query = format!(
            "SELECT {} FROM {} WHERE {} = $1 ORDER BY position ASC, created_at ASC",
            item_columns(kind),
            kind.items_table(),
            kind.parent_column()
        );
        let items = sqlx::query_as::<_, DocumentItem>(&query)
            .bind(document_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list items"))?;
        timer.observe_duration();
        Ok(items)
    }

    #[instrument(skip(self), fields(kind = kind.as_str(), item_id = %id))]
    async fn get_item(&self, kind: DocumentKind, id: Uuid) -> Result<Option<DocumentItem>, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["get_item"]).start_timer();
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1",
            item_columns(kind),
            kind.items_table()
        );
        let item = sqlx::query_as::<_, DocumentItem>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to get item"))?;
        timer.observe_duration();
        Ok(item)
    }

    #[instrument(skip(self, item, audit), fields(kind = kind.as_str(), item_id = %item.id))]
    async fn insert_item(
        &self,
        kind: DocumentKind,
        item: DocumentItem,
        audit: AuditLog,
    ) -> Result<DocumentItem, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["insert_item"]).start_timer();
        let mut tx = self.begin().await?;
        let saved = write_item(&mut tx, kind, &item).await?;
        write_audit(&mut tx, &audit).await?;
        tx.commit().await.map_err(db_error("Failed to commit item"))?;
        timer.observe_duration();
        Ok(saved)
    }

    #[instrument(skip(self, item, audit), fields(kind = kind.as_str(), item_id = %item.id))]
    async fn update_item(
        &self,
        kind: DocumentKind,
        item: DocumentItem,
        audit: AuditLog,
    ) -> Result<DocumentItem, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["update_item"]).start_timer();
        let mut tx = self.begin().await?;

        let query = format!(
            "UPDATE {} SET description = $2, quantity = $3, unit_price_excluding_tax = $4, \
             tax_rate = $5, total_excluding_tax = $6, tax_amount = $7, total_including_tax = $8, \
             position = $9, updated_at = $10 WHERE id = $1 RETURNING {}",
            kind.items_table(),
            item_columns(kind)
        );
        let saved = sqlx::query_as::<_, DocumentItem>(&query)
            .bind(item.id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price_excluding_tax)
            .bind(item.tax_rate)
            .bind(item.total_excluding_tax)
            .bind(item.tax_amount)
            .bind(item.total_including_tax)
            .bind(item.position)
            .bind(item.updated_at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to update item"))?
            .ok_or_else(|| AppError::not_found("Item"))?;

        write_audit(&mut tx, &audit).await?;
        tx.commit().await.map_err(db_error("Failed to commit item"))?;
        timer.observe_duration();
        Ok(saved)
    }

    #[instrument(skip(self, audit), fields(kind = kind.as_str(), item_id = %id))]
    async fn delete_item(&self, kind: DocumentKind, id: Uuid, audit: AuditLog) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["delete_item"]).start_timer();
        let mut tx = self.begin().await?;

        let query = format!("DELETE FROM {} WHERE id = $1", kind.items_table());
        let result = sqlx::query(&query)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to delete item"))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Item"));
        }

        write_audit(&mut tx, &audit).await?;
        tx.commit().await.map_err(db_error("Failed to commit item"))?;
        timer.observe_duration();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reservations and workshop tasks
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(reservation_id = %id))]
    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_reservation"])
            .start_timer();
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT id, client_id, service_id, status, created_at, updated_at
            FROM reservations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get reservation"))?;
        timer.observe_duration();
        Ok(reservation)
    }

    #[instrument(skip(self, reservation, tasks, audit), fields(reservation_id = %reservation.id))]
    async fn confirm_reservation(
        &self,
        reservation: Reservation,
        tasks: Vec<WorkshopTask>,
        audit: AuditLog,
    ) -> Result<(Reservation, Vec<WorkshopTask>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["confirm_reservation"])
            .start_timer();
        let mut tx = self.begin().await?;

        let saved = sqlx::query_as::<_, Reservation>(
            r#"
            UPDATE reservations SET status = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, client_id, service_id, status, created_at, updated_at
            "#,
        )
        .bind(reservation.id)
        .bind(&reservation.status)
        .bind(reservation.updated_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to confirm reservation"))?
        .ok_or_else(|| AppError::not_found("Reservation"))?;

        // The UPDATE above holds the reservation row lock for the rest of
        // the transaction, so concurrent confirmations serialize here.
        let (existing,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM workshop_tasks WHERE reservation_id = $1",
        )
        .bind(saved.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to count tasks"))?;

        if existing == 0 {
            for task in &tasks {
                let query = format!(
                    "INSERT INTO workshop_tasks ({TASK_COLUMNS}) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
                );
                sqlx::query(&query)
                    .bind(task.id)
                    .bind(task.reservation_id)
                    .bind(task.step_id)
                    .bind(task.step_number)
                    .bind(&task.title)
                    .bind(&task.description)
                    .bind(task.is_completed)
                    .bind(&task.comment)
                    .bind(task.completed_at)
                    .bind(task.created_at)
                    .bind(task.updated_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error("Failed to insert task"))?;
            }
        }

        write_audit(&mut tx, &audit).await?;

        let query = format!(
            "SELECT {TASK_COLUMNS} FROM workshop_tasks WHERE reservation_id = $1 \
             ORDER BY step_number ASC, created_at ASC"
        );
        let all_tasks = sqlx::query_as::<_, WorkshopTask>(&query)
            .bind(saved.id)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_error("Failed to list tasks"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit reservation"))?;
        timer.observe_duration();

        info!(
            reservation_id = %saved.id,
            tasks = all_tasks.len(),
            created = existing == 0 && !tasks.is_empty(),
            "Reservation confirmed"
        );
        Ok((saved, all_tasks))
    }

    #[instrument(skip(self), fields(reservation_id = %reservation_id))]
    async fn list_tasks(&self, reservation_id: Uuid) -> Result<Vec<WorkshopTask>, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["list_tasks"]).start_timer();
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM workshop_tasks WHERE reservation_id = $1 \
             ORDER BY step_number ASC, created_at ASC"
        );
        let tasks = sqlx::query_as::<_, WorkshopTask>(&query)
            .bind(reservation_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list tasks"))?;
        timer.observe_duration();
        Ok(tasks)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn get_task(&self, id: Uuid) -> Result<Option<WorkshopTask>, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["get_task"]).start_timer();
        let query = format!("SELECT {TASK_COLUMNS} FROM workshop_tasks WHERE id = $1");
        let task = sqlx::query_as::<_, WorkshopTask>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to get task"))?;
        timer.observe_duration();
        Ok(task)
    }

    #[instrument(skip(self, task, audit), fields(task_id = %task.id))]
    async fn update_task(&self, task: WorkshopTask, audit: AuditLog) -> Result<WorkshopTask, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["update_task"]).start_timer();
        let mut tx = self.begin().await?;

        let query = format!(
            "UPDATE workshop_tasks SET is_completed = $2, comment = $3, completed_at = $4, \
             updated_at = $5 WHERE id = $1 RETURNING {TASK_COLUMNS}"
        );
        let saved = sqlx::query_as::<_, WorkshopTask>(&query)
            .bind(task.id)
            .bind(task.is_completed)
            .bind(&task.comment)
            .bind(task.completed_at)
            .bind(task.updated_at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to update task"))?
            .ok_or_else(|| AppError::not_found("Task"))?;

        write_audit(&mut tx, &audit).await?;
        tx.commit().await.map_err(db_error("Failed to commit task"))?;
        timer.observe_duration();
        Ok(saved)
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn get_settings(&self) -> Result<Option<ApplicationSettings>, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["get_settings"]).start_timer();
        let query = format!("SELECT {SETTINGS_COLUMNS} FROM application_settings WHERE id = 1");
        let settings = sqlx::query_as::<_, ApplicationSettings>(&query)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to get settings"))?;
        timer.observe_duration();
        Ok(settings)
    }

    #[instrument(skip(self, settings))]
    async fn save_settings(
        &self,
        settings: ApplicationSettings,
    ) -> Result<ApplicationSettings, AppError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["save_settings"]).start_timer();
        let query = format!(
            "INSERT INTO application_settings (id, {SETTINGS_COLUMNS}) \
             VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (id) DO UPDATE SET company_name = EXCLUDED.company_name, \
             address = EXCLUDED.address, postal_code = EXCLUDED.postal_code, city = EXCLUDED.city, \
             phone = EXCLUDED.phone, email = EXCLUDED.email, website = EXCLUDED.website, \
             siret = EXCLUDED.siret, tva_number = EXCLUDED.tva_number, \
             bank_name = EXCLUDED.bank_name, iban = EXCLUDED.iban, bic = EXCLUDED.bic, \
             logo_url = EXCLUDED.logo_url, updated_at = EXCLUDED.updated_at \
             RETURNING {SETTINGS_COLUMNS}"
        );
        let saved = sqlx::query_as::<_, ApplicationSettings>(&query)
            .bind(&settings.company_name)
            .bind(&settings.address)
            .bind(&settings.postal_code)
            .bind(&settings.city)
            .bind(&settings.phone)
            .bind(&settings.email)
            .bind(&settings.website)
            .bind(&settings.siret)
            .bind(&settings.tva_number)
            .bind(&settings.bank_name)
            .bind(&settings.iban)
            .bind(&settings.bic)
            .bind(&settings.logo_url)
            .bind(settings.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to save settings"))?;
        timer.observe_duration();
        Ok(saved)
    }

    // -------------------------------------------------------------------------
    // Audit
    // -------------------------------------------------------------------------

    #[instrument(skip(self, log), fields(entity_type = %log.entity_type, action = %log.action))]
    async fn insert_audit_log(&self, log: AuditLog) -> Result<AuditLog, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_audit_log"])
            .start_timer();
        let mut tx = self.begin().await?;
        write_audit(&mut tx, &log).await?;
        tx.commit().await.map_err(db_error("Failed to commit audit log"))?;
        timer.observe_duration();
        Ok(log)
    }

    #[instrument(skip(self))]
    async fn list_audit_logs(&self, filter: &AuditLogFilter) -> Result<(Vec<AuditLog>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_audit_logs"])
            .start_timer();

        // Build dynamic WHERE clause
        let mut conditions = vec!["TRUE".to_string()];
        let mut param_idx = 1;
        if filter.entity_type.is_some() {
            conditions.push(format!("entity_type = ${}", param_idx));
            param_idx += 1;
        }
        if filter.action.is_some() {
            conditions.push(format!("action = ${}", param_idx));
            param_idx += 1;
        }
        if filter.entity_id.is_some() {
            conditions.push(format!("entity_id = ${}", param_idx));
            param_idx += 1;
        }
        let where_clause = conditions.join(" AND ");

        let count_query = format!("SELECT COUNT(*) FROM audit_logs WHERE {}", where_clause);
        let data_query = format!(
            "SELECT {} FROM audit_logs WHERE {} ORDER BY occurred_at DESC, id DESC LIMIT ${} OFFSET ${}",
            AUDIT_COLUMNS,
            where_clause,
            param_idx,
            param_idx + 1
        );

        let mut count_q = sqlx::query_as::<_, (i64,)>(&count_query);
        let mut data_q = sqlx::query_as::<_, AuditLog>(&data_query);
        if let Some(kind) = filter.entity_type {
            count_q = count_q.bind(kind.as_str());
            data_q = data_q.bind(kind.as_str());
        }
        if let Some(action) = filter.action {
            count_q = count_q.bind(action.as_str());
            data_q = data_q.bind(action.as_str());
        }
        if let Some(entity_id) = filter.entity_id {
            count_q = count_q.bind(entity_id);
            data_q = data_q.bind(entity_id);
        }

        let (total,) = count_q
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to count audit logs"))?;
        let mut logs = data_q
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list audit logs"))?;

        let ids: Vec<Uuid> = logs.iter().map(|log| log.id).collect();
        if !ids.is_empty() {
            let changes = sqlx::query_as::<_, AuditLogChange>(
                r#"
                SELECT id, audit_log_id, field, previous_value, new_value, position
                FROM audit_log_changes
                WHERE audit_log_id = ANY($1)
                ORDER BY position ASC
                "#,
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list audit changes"))?;

            let mut by_log: HashMap<Uuid, Vec<AuditLogChange>> = HashMap::new();
            for change in changes {
                by_log.entry(change.audit_log_id).or_default().push(change);
            }
            for log in &mut logs {
                log.changes = by_log.remove(&log.id).unwrap_or_default();
            }
        }

        timer.observe_duration();
        Ok((logs, total))
    }
}
