//! Invoice (facture) model.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::quote::single_line_description;
use super::{AuditAction, Quote, Service};
use crate::pricing::{compute_line_totals, SingleLine};

/// Payment term applied when no due date is given.
pub const DEFAULT_PAYMENT_DAYS: i64 = 30;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvoiceStatus::Pending),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }

    pub fn transition_action(&self) -> AuditAction {
        match self {
            InvoiceStatus::Paid => AuditAction::Paid,
            InvoiceStatus::Cancelled => AuditAction::Cancelled,
            InvoiceStatus::Pending | InvoiceStatus::Overdue => AuditAction::Updated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub client_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub status: String,
    pub invoice_number: String,
    pub wheel_count: Option<i32>,
    pub diameter: Option<String>,
    pub product_details: Option<String>,
    pub price_excluding_tax: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Builds a pending invoice. Fields the input leaves empty are taken from
    /// the originating quote, when there is one.
    pub fn new(
        input: &CreateInvoice,
        quote: Option<&Quote>,
        invoice_number: String,
        now: DateTime<Utc>,
    ) -> Self {
        let mut invoice = Self {
            id: Uuid::new_v4(),
            client_id: input.client_id,
            quote_id: quote.map(|q| q.id),
            service_id: input.service_id.or_else(|| quote.and_then(|q| q.service_id)),
            status: InvoiceStatus::Pending.as_str().to_string(),
            invoice_number,
            wheel_count: input.wheel_count.or_else(|| quote.and_then(|q| q.wheel_count)),
            diameter: input
                .diameter
                .clone()
                .or_else(|| quote.and_then(|q| q.diameter.clone())),
            product_details: input
                .product_details
                .clone()
                .or_else(|| quote.and_then(|q| q.product_details.clone())),
            price_excluding_tax: input
                .price_excluding_tax
                .or_else(|| quote.map(|q| q.price_excluding_tax))
                .unwrap_or(Decimal::ZERO),
            tax_rate: input
                .tax_rate
                .or_else(|| quote.map(|q| q.tax_rate))
                .unwrap_or_else(crate::pricing::default_tax_rate),
            tax_amount: Decimal::ZERO,
            amount: Decimal::ZERO,
            due_date: input
                .due_date
                .or_else(|| Some((now + Duration::days(DEFAULT_PAYMENT_DAYS)).date_naive())),
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        invoice.recompute();
        invoice
    }

    fn recompute(&mut self) {
        let totals = compute_line_totals(Decimal::ONE, self.price_excluding_tax, self.tax_rate);
        self.tax_amount = totals.tax_amount;
        self.amount = totals.total_including_tax;
    }

    pub fn status(&self) -> Option<InvoiceStatus> {
        InvoiceStatus::parse(&self.status)
    }

    pub fn with_update(&self, update: &UpdateInvoice, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if let Some(status) = update.status {
            next.status = status.as_str().to_string();
        }
        if let Some(service_id) = update.service_id {
            next.service_id = Some(service_id);
        }
        if let Some(wheel_count) = update.wheel_count {
            next.wheel_count = Some(wheel_count);
        }
        if let Some(diameter) = &update.diameter {
            next.diameter = Some(diameter.clone());
        }
        if let Some(details) = &update.product_details {
            next.product_details = Some(details.clone());
        }
        if let Some(price) = update
            .price_excluding_tax
            .filter(|p| *p != next.price_excluding_tax)
        {
            next.price_excluding_tax = price;
        }
        if let Some(rate) = update.tax_rate.filter(|r| *r != next.tax_rate) {
            next.tax_rate = rate;
        }
        if let Some(due_date) = update.due_date {
            next.due_date = Some(due_date);
        }
        if let Some(notes) = &update.notes {
            next.notes = Some(notes.clone());
        }
        next.recompute();
        if next != *self {
            next.updated_at = now;
        }
        next
    }

    /// The invoice's own pricing as a single printable line. Descriptive
    /// fields missing on the invoice are read from the originating quote.
    pub fn single_line(&self, quote: Option<&Quote>, service: Option<&Service>) -> SingleLine {
        SingleLine {
            description: single_line_description(
                service,
                self.wheel_count.or_else(|| quote.and_then(|q| q.wheel_count)),
                self.diameter
                    .as_deref()
                    .or_else(|| quote.and_then(|q| q.diameter.as_deref())),
                self.product_details
                    .as_deref()
                    .or_else(|| quote.and_then(|q| q.product_details.as_deref())),
            ),
            quantity: Decimal::ONE,
            unit_price_excluding_tax: self.price_excluding_tax,
            tax_rate: self.tax_rate,
        }
    }
}

/// Input for creating an invoice.
#[derive(Debug, Clone, Default)]
pub struct CreateInvoice {
    pub client_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub wheel_count: Option<i32>,
    pub diameter: Option<String>,
    pub product_details: Option<String>,
    pub price_excluding_tax: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Input for updating an invoice. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub status: Option<InvoiceStatus>,
    pub service_id: Option<Uuid>,
    pub wheel_count: Option<i32>,
    pub diameter: Option<String>,
    pub product_details: Option<String>,
    pub price_excluding_tax: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateQuote;
    use std::str::FromStr;

    #[test]
    fn test_invoice_inherits_from_quote() {
        let quote = Quote::new(
            &CreateQuote {
                client_id: Uuid::new_v4(),
                service_id: Some(Uuid::new_v4()),
                wheel_count: Some(4),
                diameter: Some("17".to_string()),
                product_details: Some("Noir mat".to_string()),
                price_excluding_tax: Decimal::from(400),
                tax_rate: Decimal::from(20),
                valid_until: None,
                notes: None,
            },
            "DEV-2024-00003".to_string(),
            Utc::now(),
        );

        let invoice = Invoice::new(
            &CreateInvoice {
                client_id: quote.client_id,
                quote_id: Some(quote.id),
                ..Default::default()
            },
            Some(&quote),
            "FAC-2024-00001".to_string(),
            Utc::now(),
        );

        assert_eq!(invoice.quote_id, Some(quote.id));
        assert_eq!(invoice.service_id, quote.service_id);
        assert_eq!(invoice.wheel_count, Some(4));
        assert_eq!(invoice.amount, Decimal::from_str("480.00").unwrap());
        assert_eq!(invoice.status(), Some(InvoiceStatus::Pending));
    }

    #[test]
    fn test_paid_transition_action() {
        assert_eq!(InvoiceStatus::Paid.transition_action(), AuditAction::Paid);
        assert_eq!(InvoiceStatus::Overdue.transition_action(), AuditAction::Updated);
    }
}
