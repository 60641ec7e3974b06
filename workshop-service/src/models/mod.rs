//! Domain models for workshop-service.

mod audit_log;
mod catalog;
mod client;
mod document_item;
mod invoice;
mod quote;
mod reservation;
mod settings;
mod workshop_task;

pub use audit_log::{AuditAction, AuditEntityType, AuditLog, AuditLogChange, AuditLogFilter};
pub use catalog::{Service, ServiceWithWorkflow, Workflow, WorkflowStep, WorkflowWithSteps};
pub use client::Client;
pub use document_item::{CreateDocumentItem, DocumentItem, DocumentKind, UpdateDocumentItem};
pub use invoice::{CreateInvoice, Invoice, InvoiceStatus, UpdateInvoice};
pub use quote::{CreateQuote, Quote, QuoteStatus, UpdateQuote};
pub use reservation::{Reservation, ReservationStatus};
pub use settings::{ApplicationSettings, UpdateSettings};
pub use workshop_task::WorkshopTask;
