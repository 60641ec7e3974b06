//! PDF rendering engine.
//!
//! Layout is pure and produces a [`DocumentLayout`]; [`render_pdf`] turns it
//! into bytes. Company identity is always passed in explicitly.

pub mod company;
pub mod document;
pub mod labels;
pub mod layout;
pub mod logo;
pub mod render;

use thiserror::Error;

pub use company::{merge_with_defaults, CompanyInfo};
pub use document::{layout_document, DocumentContent};
pub use labels::{label_qr_png, labels_for, layout_label_sheet, Label, LabelPosition};
pub use layout::DocumentLayout;
pub use logo::{LogoImage, LogoLoader};
pub use render::render_pdf;

use crate::models::{
    ApplicationSettings, Client, DocumentItem, DocumentKind, Invoice, Quote, Service,
};
use crate::pricing::DocumentLines;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("QR code generation failed: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("Logo unavailable: {0}")]
    Logo(String),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF rendering failed: {0}")]
    Render(String),
}

/// Layout of a quote; the items take precedence over the quote's own
/// single-line pricing when there are any.
pub fn quote_layout(
    quote: &Quote,
    client: &Client,
    service: Option<&Service>,
    items: Vec<DocumentItem>,
    settings: Option<&ApplicationSettings>,
    logo: Option<LogoImage>,
) -> DocumentLayout {
    let lines = DocumentLines::resolve(items, quote.single_line(service));
    let company = merge_with_defaults(settings);
    layout_document(
        &DocumentContent {
            kind: DocumentKind::Quote,
            number: &quote.reference,
            issue_date: quote.created_at.date_naive(),
            deadline: quote.valid_until,
            client,
            lines: &lines,
            notes: quote.notes.as_deref(),
            quote_reference: None,
        },
        &company,
        logo,
    )
}

pub fn invoice_layout(
    invoice: &Invoice,
    client: &Client,
    quote: Option<&Quote>,
    service: Option<&Service>,
    items: Vec<DocumentItem>,
    settings: Option<&ApplicationSettings>,
    logo: Option<LogoImage>,
) -> DocumentLayout {
    let lines = DocumentLines::resolve(items, invoice.single_line(quote, service));
    let company = merge_with_defaults(settings);
    layout_document(
        &DocumentContent {
            kind: DocumentKind::Invoice,
            number: &invoice.invoice_number,
            issue_date: invoice.created_at.date_naive(),
            deadline: invoice.due_date,
            client,
            lines: &lines,
            notes: invoice.notes.as_deref(),
            quote_reference: quote.map(|q| q.reference.as_str()),
        },
        &company,
        logo,
    )
}

pub fn render_quote_pdf(
    quote: &Quote,
    client: &Client,
    service: Option<&Service>,
    items: Vec<DocumentItem>,
    settings: Option<&ApplicationSettings>,
    logo: Option<LogoImage>,
) -> Result<Vec<u8>, PdfError> {
    render_pdf(&quote_layout(quote, client, service, items, settings, logo))
}

pub fn render_invoice_pdf(
    invoice: &Invoice,
    client: &Client,
    quote: Option<&Quote>,
    service: Option<&Service>,
    items: Vec<DocumentItem>,
    settings: Option<&ApplicationSettings>,
    logo: Option<LogoImage>,
) -> Result<Vec<u8>, PdfError> {
    render_pdf(&invoice_layout(
        invoice, client, quote, service, items, settings, logo,
    ))
}

pub fn render_label_sheet(document_number: &str, kind: DocumentKind) -> Result<Vec<u8>, PdfError> {
    render_pdf(&layout_label_sheet(document_number, kind)?)
}
