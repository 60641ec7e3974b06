//! Tax and pricing engine.
//!
//! All amounts are `Decimal`. Each derived field is rounded to two decimals
//! on its own, before it feeds the next one, so that persisted line totals
//! always add up to the displayed document totals.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::DocumentItem;

/// VAT rate applied when a line does not carry one.
pub fn default_tax_rate() -> Decimal {
    Decimal::from(20)
}

/// Largest accepted line quantity.
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);
/// Largest accepted unit price, excluding tax.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 0);
/// Largest accepted VAT rate, in percent.
pub const MAX_TAX_RATE: Decimal = Decimal::ONE_HUNDRED;

/// Rounds half away from zero and pins the scale to two decimals, so equal
/// amounts always serialize the same way.
pub fn round2(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Derived amounts for one priced line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineTotals {
    pub total_excluding_tax: Decimal,
    pub tax_amount: Decimal,
    pub total_including_tax: Decimal,
}

pub fn compute_line_totals(
    quantity: Decimal,
    unit_price_excluding_tax: Decimal,
    tax_rate: Decimal,
) -> LineTotals {
    let total_excluding_tax = round2(quantity * unit_price_excluding_tax);
    let tax_amount = round2(total_excluding_tax * tax_rate / Decimal::ONE_HUNDRED);
    LineTotals {
        total_excluding_tax,
        tax_amount,
        total_including_tax: total_excluding_tax + tax_amount,
    }
}

/// Aggregate HT / VAT / TTC of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTotals {
    pub total_ht: Decimal,
    pub total_vat: Decimal,
    pub total_ttc: Decimal,
}

impl DocumentTotals {
    fn add_line(self, line: &LineTotals) -> Self {
        Self {
            total_ht: self.total_ht + line.total_excluding_tax,
            total_vat: self.total_vat + line.tax_amount,
            total_ttc: self.total_ttc + line.total_including_tax,
        }
    }
}

/// The single priced line carried directly by a quote or invoice that has no
/// itemized lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price_excluding_tax: Decimal,
    pub tax_rate: Decimal,
}

impl SingleLine {
    pub fn totals(&self) -> LineTotals {
        compute_line_totals(self.quantity, self.unit_price_excluding_tax, self.tax_rate)
    }
}

/// Lines of a business document, resolved once when the document is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "lines", rename_all = "camelCase")]
pub enum DocumentLines {
    SingleLine(SingleLine),
    Itemized(Vec<DocumentItem>),
}

impl DocumentLines {
    /// Itemized when at least one item exists, otherwise the document's own
    /// single-line pricing.
    pub fn resolve(items: Vec<DocumentItem>, fallback: SingleLine) -> Self {
        if items.is_empty() {
            DocumentLines::SingleLine(fallback)
        } else {
            DocumentLines::Itemized(items)
        }
    }

    pub fn is_itemized(&self) -> bool {
        matches!(self, DocumentLines::Itemized(_))
    }

    pub fn totals(&self) -> DocumentTotals {
        match self {
            DocumentLines::SingleLine(line) => DocumentTotals::default().add_line(&line.totals()),
            DocumentLines::Itemized(items) => sum_items(items),
        }
    }

    /// The VAT rate shared by every line, if there is exactly one.
    pub fn uniform_tax_rate(&self) -> Option<Decimal> {
        match self {
            DocumentLines::SingleLine(line) => Some(line.tax_rate),
            DocumentLines::Itemized(items) => {
                let first = items.first()?.tax_rate;
                items
                    .iter()
                    .all(|item| item.tax_rate == first)
                    .then_some(first)
            }
        }
    }
}

/// Sum of the persisted derived fields of `items`; falls back to `fallback`
/// when there are none.
pub fn compute_document_totals(items: &[DocumentItem], fallback: &SingleLine) -> DocumentTotals {
    if items.is_empty() {
        DocumentTotals::default().add_line(&fallback.totals())
    } else {
        sum_items(items)
    }
}

fn sum_items(items: &[DocumentItem]) -> DocumentTotals {
    items
        .iter()
        .fold(DocumentTotals::default(), |acc, item| acc.add_line(&item.totals()))
}

/// Parses a user-entered amount. Anything unparsable is zero.
///
/// Accepts a comma as decimal separator and, like a lenient float parser,
/// the numeric prefix of a longer string (`"12 €"` is 12).
pub fn parse_amount(raw: &str) -> Decimal {
    let normalized = raw.trim().replace(',', ".").replace(' ', "");
    if normalized.is_empty() {
        return Decimal::ZERO;
    }

    if let Ok(value) = Decimal::from_str(&normalized) {
        return value;
    }
    if let Ok(value) = Decimal::from_scientific(&normalized) {
        return value;
    }

    numeric_prefix(&normalized)
        .and_then(|prefix| Decimal::from_str(prefix).ok())
        .unwrap_or(Decimal::ZERO)
}

fn numeric_prefix(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    let prefix = s[..end].trim_end_matches('.');
    (prefix.len() > digits_start).then_some(prefix)
}

/// Reads an amount from loosely typed JSON (number, numeric string, null).
pub fn amount_from_json(value: &serde_json::Value) -> Decimal {
    match value {
        serde_json::Value::Number(n) => parse_amount(&n.to_string()),
        serde_json::Value::String(s) => parse_amount(s),
        _ => Decimal::ZERO,
    }
}
