//! Client profile as seen by the document core.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub siret: Option<String>,
    pub tva_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    /// `client` or `professional`.
    pub role: String,
}

impl Client {
    /// Display name: company, then first + last name, then the local part of
    /// the email address.
    pub fn display_name(&self) -> String {
        if let Some(company) = non_blank(&self.company_name) {
            return company.to_string();
        }

        let full_name = [non_blank(&self.first_name), non_blank(&self.last_name)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !full_name.is_empty() {
            return full_name;
        }

        self.email
            .split('@')
            .next()
            .filter(|local| !local.is_empty())
            .unwrap_or("Client")
            .to_string()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
