//! Line items attached to a quote or an invoice.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::AuditEntityType;
use crate::pricing::{compute_line_totals, LineTotals};

/// Which kind of business document a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Quote,
    Invoice,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Quote => "quote",
            DocumentKind::Invoice => "invoice",
        }
    }

    pub fn items_table(&self) -> &'static str {
        match self {
            DocumentKind::Quote => "quote_items",
            DocumentKind::Invoice => "invoice_items",
        }
    }

    pub fn parent_column(&self) -> &'static str {
        match self {
            DocumentKind::Quote => "quote_id",
            DocumentKind::Invoice => "invoice_id",
        }
    }

    /// Item mutations are recorded against the parent document.
    pub fn audit_entity(&self) -> AuditEntityType {
        match self {
            DocumentKind::Quote => AuditEntityType::Quote,
            DocumentKind::Invoice => AuditEntityType::Invoice,
        }
    }

    /// Document title printed on PDFs and labels.
    pub fn title(&self) -> &'static str {
        match self {
            DocumentKind::Quote => "DEVIS",
            DocumentKind::Invoice => "FACTURE",
        }
    }

    /// Prefix of generated document numbers.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            DocumentKind::Quote => "DEV",
            DocumentKind::Invoice => "FAC",
        }
    }
}

/// One priced line. The three totals are derived from quantity, unit price
/// and tax rate and persisted at every save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DocumentItem {
    pub id: Uuid,
    pub document_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price_excluding_tax: Decimal,
    pub tax_rate: Decimal,
    pub total_excluding_tax: Decimal,
    pub tax_amount: Decimal,
    pub total_including_tax: Decimal,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentItem {
    pub fn new(
        document_id: Uuid,
        description: String,
        quantity: Decimal,
        unit_price_excluding_tax: Decimal,
        tax_rate: Decimal,
        position: i32,
        now: DateTime<Utc>,
    ) -> Self {
        let mut item = Self {
            id: Uuid::new_v4(),
            document_id,
            description,
            quantity,
            unit_price_excluding_tax,
            tax_rate,
            total_excluding_tax: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_including_tax: Decimal::ZERO,
            position,
            created_at: now,
            updated_at: now,
        };
        item.recompute();
        item
    }

    /// Refreshes the derived totals from the current inputs.
    pub fn recompute(&mut self) {
        let totals = compute_line_totals(self.quantity, self.unit_price_excluding_tax, self.tax_rate);
        self.total_excluding_tax = totals.total_excluding_tax;
        self.tax_amount = totals.tax_amount;
        self.total_including_tax = totals.total_including_tax;
    }

    /// The persisted derived totals.
    pub fn totals(&self) -> LineTotals {
        LineTotals {
            total_excluding_tax: self.total_excluding_tax,
            tax_amount: self.tax_amount,
            total_including_tax: self.total_including_tax,
        }
    }

    /// Applies a partial update and recomputes the totals. Returns the updated
    /// copy; `self` is left untouched so callers can diff both snapshots.
    pub fn with_update(&self, update: &UpdateDocumentItem, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if let Some(description) = &update.description {
            next.description = description.clone();
        }
        // Decimal equality is numeric; keep the stored scale when the value
        // is the same so snapshots do not differ on formatting alone.
        if let Some(quantity) = update.quantity.filter(|q| *q != next.quantity) {
            next.quantity = quantity;
        }
        if let Some(unit_price) = update
            .unit_price_excluding_tax
            .filter(|p| *p != next.unit_price_excluding_tax)
        {
            next.unit_price_excluding_tax = unit_price;
        }
        if let Some(tax_rate) = update.tax_rate.filter(|r| *r != next.tax_rate) {
            next.tax_rate = tax_rate;
        }
        if let Some(position) = update.position {
            next.position = position;
        }
        next.recompute();
        if next != *self {
            next.updated_at = now;
        }
        next
    }

    /// Copy of this line under another document, e.g. when an invoice is
    /// issued from a quote.
    pub fn copy_to(&self, document_id: Uuid, now: DateTime<Utc>) -> Self {
        Self::new(
            document_id,
            self.description.clone(),
            self.quantity,
            self.unit_price_excluding_tax,
            self.tax_rate,
            self.position,
            now,
        )
    }
}

/// Input for creating an item.
#[derive(Debug, Clone)]
pub struct CreateDocumentItem {
    pub kind: DocumentKind,
    pub document_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price_excluding_tax: Decimal,
    pub tax_rate: Decimal,
    pub position: Option<i32>,
}

/// Input for updating an item. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateDocumentItem {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price_excluding_tax: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub position: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_new_item_has_consistent_totals() {
        let item = DocumentItem::new(
            Uuid::new_v4(),
            "Peinture jante".to_string(),
            d("2"),
            d("50.00"),
            d("20"),
            0,
            Utc::now(),
        );
        assert_eq!(item.total_excluding_tax, d("100.00"));
        assert_eq!(item.tax_amount, d("20.00"));
        assert_eq!(item.total_including_tax, d("120.00"));
    }

    #[test]
    fn test_update_recomputes_and_keeps_original() {
        let original = DocumentItem::new(
            Uuid::new_v4(),
            "Diamantage".to_string(),
            d("4"),
            d("45"),
            d("20"),
            0,
            Utc::now(),
        );

        let updated = original.with_update(
            &UpdateDocumentItem {
                quantity: Some(d("2")),
                ..Default::default()
            },
            Utc::now(),
        );

        assert_eq!(original.total_excluding_tax, d("180.00"));
        assert_eq!(updated.total_excluding_tax, d("90.00"));
        assert_eq!(updated.tax_amount, d("18.00"));
        assert_eq!(updated.total_including_tax, d("108.00"));
        assert_eq!(updated.description, "Diamantage");
    }

    #[test]
    fn test_empty_update_keeps_timestamp() {
        let original = DocumentItem::new(
            Uuid::new_v4(),
            "Diamantage".to_string(),
            d("1"),
            d("45"),
            d("20"),
            0,
            Utc::now(),
        );
        let later = original.updated_at + chrono::Duration::minutes(5);
        let same = original.with_update(&UpdateDocumentItem::default(), later);
        assert_eq!(same, original);
    }
}
