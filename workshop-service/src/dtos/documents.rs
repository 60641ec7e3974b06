use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::lenient_amount;
use crate::models::{
    CreateInvoice, CreateQuote, InvoiceStatus, QuoteStatus, UpdateDocumentItem, UpdateInvoice,
    UpdateQuote,
};
use crate::pricing::default_tax_rate;
use crate::services::workshop::ItemDraft;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuoteRequest {
    pub client_id: Uuid,
    pub service_id: Option<Uuid>,
    #[validate(range(min = 0, max = 100, message = "Wheel count must be between 0 and 100"))]
    pub wheel_count: Option<i32>,
    #[validate(length(max = 50))]
    pub diameter: Option<String>,
    #[validate(length(max = 2000))]
    pub product_details: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub price_excluding_tax: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub tax_rate: Option<Decimal>,
    pub valid_until: Option<NaiveDate>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

impl From<CreateQuoteRequest> for CreateQuote {
    fn from(req: CreateQuoteRequest) -> Self {
        Self {
            client_id: req.client_id,
            service_id: req.service_id,
            wheel_count: req.wheel_count,
            diameter: req.diameter,
            product_details: req.product_details,
            price_excluding_tax: req.price_excluding_tax.unwrap_or(Decimal::ZERO),
            tax_rate: req.tax_rate.unwrap_or_else(default_tax_rate),
            valid_until: req.valid_until,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuoteRequest {
    pub status: Option<QuoteStatus>,
    pub service_id: Option<Uuid>,
    #[validate(range(min = 0, max = 100, message = "Wheel count must be between 0 and 100"))]
    pub wheel_count: Option<i32>,
    #[validate(length(max = 50))]
    pub diameter: Option<String>,
    #[validate(length(max = 2000))]
    pub product_details: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub price_excluding_tax: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub tax_rate: Option<Decimal>,
    pub valid_until: Option<NaiveDate>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

impl From<UpdateQuoteRequest> for UpdateQuote {
    fn from(req: UpdateQuoteRequest) -> Self {
        Self {
            status: req.status,
            service_id: req.service_id,
            wheel_count: req.wheel_count,
            diameter: req.diameter,
            product_details: req.product_details,
            price_excluding_tax: req.price_excluding_tax,
            tax_rate: req.tax_rate,
            valid_until: req.valid_until,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub client_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    #[validate(range(min = 0, max = 100, message = "Wheel count must be between 0 and 100"))]
    pub wheel_count: Option<i32>,
    #[validate(length(max = 50))]
    pub diameter: Option<String>,
    #[validate(length(max = 2000))]
    pub product_details: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub price_excluding_tax: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub tax_rate: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

impl From<CreateInvoiceRequest> for CreateInvoice {
    fn from(req: CreateInvoiceRequest) -> Self {
        Self {
            client_id: req.client_id,
            quote_id: req.quote_id,
            service_id: req.service_id,
            wheel_count: req.wheel_count,
            diameter: req.diameter,
            product_details: req.product_details,
            price_excluding_tax: req.price_excluding_tax,
            tax_rate: req.tax_rate,
            due_date: req.due_date,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceRequest {
    pub status: Option<InvoiceStatus>,
    pub service_id: Option<Uuid>,
    #[validate(range(min = 0, max = 100, message = "Wheel count must be between 0 and 100"))]
    pub wheel_count: Option<i32>,
    #[validate(length(max = 50))]
    pub diameter: Option<String>,
    #[validate(length(max = 2000))]
    pub product_details: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub price_excluding_tax: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub tax_rate: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

impl From<UpdateInvoiceRequest> for UpdateInvoice {
    fn from(req: UpdateInvoiceRequest) -> Self {
        Self {
            status: req.status,
            service_id: req.service_id,
            wheel_count: req.wheel_count,
            diameter: req.diameter,
            product_details: req.product_details,
            price_excluding_tax: req.price_excluding_tax,
            tax_rate: req.tax_rate,
            due_date: req.due_date,
            notes: req.notes,
        }
    }
}

/// New line item. Presence of description, quantity and unit price is
/// checked by the item service so that all missing fields are reported.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub quantity: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub unit_price_excluding_tax: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub tax_rate: Option<Decimal>,
    #[validate(range(min = 0))]
    pub position: Option<i32>,
}

impl From<CreateItemRequest> for ItemDraft {
    fn from(req: CreateItemRequest) -> Self {
        Self {
            description: req.description,
            quantity: req.quantity,
            unit_price_excluding_tax: req.unit_price_excluding_tax,
            tax_rate: req.tax_rate,
            position: req.position,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub quantity: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub unit_price_excluding_tax: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub tax_rate: Option<Decimal>,
    #[validate(range(min = 0))]
    pub position: Option<i32>,
}

impl From<UpdateItemRequest> for UpdateDocumentItem {
    fn from(req: UpdateItemRequest) -> Self {
        Self {
            description: req.description,
            quantity: req.quantity,
            unit_price_excluding_tax: req.unit_price_excluding_tax,
            tax_rate: req.tax_rate,
            position: req.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_create_quote_defaults() {
        let req: CreateQuoteRequest = serde_json::from_str(&format!(
            r#"{{"clientId": "{}", "priceExcludingTax": "180,00"}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        let input = CreateQuote::from(req);
        assert_eq!(input.price_excluding_tax, Decimal::from_str("180.00").unwrap());
        assert_eq!(input.tax_rate, Decimal::from(20));
    }

    #[test]
    fn test_update_quote_status_parses() {
        let req: UpdateQuoteRequest = serde_json::from_str(r#"{"status": "approved"}"#).unwrap();
        assert_eq!(req.status, Some(QuoteStatus::Approved));
        assert!(serde_json::from_str::<UpdateQuoteRequest>(r#"{"status": "archived"}"#).is_err());
    }

    #[test]
    fn test_wheel_count_range_validated() {
        let req = UpdateQuoteRequest {
            wheel_count: Some(-1),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}
