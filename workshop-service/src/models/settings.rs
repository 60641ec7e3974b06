use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Company identity singleton. Every field is optional; the PDF engine fills
/// gaps with its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSettings {
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub siret: Option<String>,
    pub tva_number: Option<String>,
    pub bank_name: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub logo_url: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettings {
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub siret: Option<String>,
    pub tva_number: Option<String>,
    pub bank_name: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub logo_url: Option<String>,
}

impl ApplicationSettings {
    /// Applies the provided fields. An empty string clears a field.
    pub fn with_update(&self, update: &UpdateSettings, now: DateTime<Utc>) -> Self {
        fn apply(current: &Option<String>, incoming: &Option<String>) -> Option<String> {
            match incoming {
                Some(value) if value.trim().is_empty() => None,
                Some(value) => Some(value.trim().to_string()),
                None => current.clone(),
            }
        }

        Self {
            company_name: apply(&self.company_name, &update.company_name),
            address: apply(&self.address, &update.address),
            postal_code: apply(&self.postal_code, &update.postal_code),
            city: apply(&self.city, &update.city),
            phone: apply(&self.phone, &update.phone),
            email: apply(&self.email, &update.email),
            website: apply(&self.website, &update.website),
            siret: apply(&self.siret, &update.siret),
            tva_number: apply(&self.tva_number, &update.tva_number),
            bank_name: apply(&self.bank_name, &update.bank_name),
            iban: apply(&self.iban, &update.iban),
            bic: apply(&self.bic, &update.bic),
            logo_url: apply(&self.logo_url, &update.logo_url),
            updated_at: Some(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_sets_and_clears() {
        let settings = ApplicationSettings {
            company_name: Some("Jantes Pro".to_string()),
            iban: Some("FR76 0000".to_string()),
            ..Default::default()
        };
        let updated = settings.with_update(
            &UpdateSettings {
                city: Some(" Lyon ".to_string()),
                iban: Some(String::new()),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(updated.company_name.as_deref(), Some("Jantes Pro"));
        assert_eq!(updated.city.as_deref(), Some("Lyon"));
        assert_eq!(updated.iban, None);
        assert!(updated.updated_at.is_some());
    }
}
