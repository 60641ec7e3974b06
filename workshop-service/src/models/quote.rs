//! Quote (devis) model.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{AuditAction, Service};
use crate::pricing::{compute_line_totals, SingleLine};

/// Days a quote stays valid when no explicit date is given.
pub const DEFAULT_VALIDITY_DAYS: i64 = 30;

/// Quote status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::Approved => "approved",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QuoteStatus::Pending),
            "approved" => Some(QuoteStatus::Approved),
            "rejected" => Some(QuoteStatus::Rejected),
            "completed" => Some(QuoteStatus::Completed),
            _ => None,
        }
    }

    /// Audit action recorded when a quote moves into this status.
    pub fn transition_action(&self) -> AuditAction {
        match self {
            QuoteStatus::Approved => AuditAction::Validated,
            QuoteStatus::Rejected => AuditAction::Rejected,
            QuoteStatus::Completed => AuditAction::Completed,
            QuoteStatus::Pending => AuditAction::Updated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: Uuid,
    pub client_id: Uuid,
    pub service_id: Option<Uuid>,
    pub status: String,
    pub reference: String,
    pub wheel_count: Option<i32>,
    pub diameter: Option<String>,
    pub product_details: Option<String>,
    pub price_excluding_tax: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub quote_amount: Decimal,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(input: &CreateQuote, reference: String, now: DateTime<Utc>) -> Self {
        let mut quote = Self {
            id: Uuid::new_v4(),
            client_id: input.client_id,
            service_id: input.service_id,
            status: QuoteStatus::Pending.as_str().to_string(),
            reference,
            wheel_count: input.wheel_count,
            diameter: input.diameter.clone(),
            product_details: input.product_details.clone(),
            price_excluding_tax: input.price_excluding_tax,
            tax_rate: input.tax_rate,
            tax_amount: Decimal::ZERO,
            quote_amount: Decimal::ZERO,
            valid_until: input
                .valid_until
                .or_else(|| Some((now + Duration::days(DEFAULT_VALIDITY_DAYS)).date_naive())),
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        quote.recompute();
        quote
    }

    fn recompute(&mut self) {
        let totals = compute_line_totals(Decimal::ONE, self.price_excluding_tax, self.tax_rate);
        self.tax_amount = totals.tax_amount;
        self.quote_amount = totals.total_including_tax;
    }

    pub fn status(&self) -> Option<QuoteStatus> {
        QuoteStatus::parse(&self.status)
    }

    /// Applies a partial update and recomputes the single-line pricing.
    pub fn with_update(&self, update: &UpdateQuote, now: DateTime<Utc>) -> Self {
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
        if let Some(valid_until) = update.valid_until {
            next.valid_until = Some(valid_until);
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

    /// The quote's own pricing as a single printable line.
    pub fn single_line(&self, service: Option<&Service>) -> SingleLine {
        SingleLine {
            description: single_line_description(
                service,
                self.wheel_count,
                self.diameter.as_deref(),
                self.product_details.as_deref(),
            ),
            quantity: Decimal::ONE,
            unit_price_excluding_tax: self.price_excluding_tax,
            tax_rate: self.tax_rate,
        }
    }
}

/// Builds the description of a document's synthesized single line.
pub(crate) fn single_line_description(
    service: Option<&Service>,
    wheel_count: Option<i32>,
    diameter: Option<&str>,
    product_details: Option<&str>,
) -> String {
    let base = service
        .map(|s| {
            s.description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(&s.name)
                .to_string()
        })
        .unwrap_or_else(|| "Rénovation de jantes".to_string());

    let mut parts = vec![base];
    if let Some(count) = wheel_count.filter(|c| *c > 0) {
        parts.push(format!("{} jante{}", count, if count > 1 { "s" } else { "" }));
    }
    if let Some(diameter) = diameter.map(str::trim).filter(|d| !d.is_empty()) {
        parts.push(format!("Diamètre {}", diameter));
    }
    if let Some(details) = product_details.map(str::trim).filter(|d| !d.is_empty()) {
        parts.push(details.to_string());
    }
    parts.join(" - ")
}

/// Input for creating a quote.
#[derive(Debug, Clone)]
pub struct CreateQuote {
    pub client_id: Uuid,
    pub service_id: Option<Uuid>,
    pub wheel_count: Option<i32>,
    pub diameter: Option<String>,
    pub product_details: Option<String>,
    pub price_excluding_tax: Decimal,
    pub tax_rate: Decimal,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Input for updating a quote. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateQuote {
    pub status: Option<QuoteStatus>,
    pub service_id: Option<Uuid>,
    pub wheel_count: Option<i32>,
    pub diameter: Option<String>,
    pub product_details: Option<String>,
    pub price_excluding_tax: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
}
