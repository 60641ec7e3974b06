pub mod audit;
pub mod documents;
pub mod workshop;

pub use audit::{AuditLogsQuery, AuditLogsResponse, RecordAuditEventRequest};
pub use documents::{
    CreateInvoiceRequest, CreateItemRequest, CreateQuoteRequest, UpdateInvoiceRequest,
    UpdateItemRequest, UpdateQuoteRequest,
};
pub use workshop::{
    ReplaceWorkflowRequest, SettingsResponse, TaskCommentRequest, UpdateTaskRequest,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::pricing::amount_from_json;

/// Amount from a number or a numeric string. `null`, absent and blank
/// strings are `None`; other unparsable input reads as zero.
pub(crate) fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
        Some(other) => Some(amount_from_json(&other)),
    })
}

/// Tells an explicit `null` (`Some(None)`) apart from an absent field (`None`).
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
