//! Issuer identity printed on documents.

use serde::Serialize;

use crate::models::ApplicationSettings;

pub const DEFAULT_COMPANY_NAME: &str = "Atelier Jantes Rénovation";
pub const DEFAULT_ADDRESS: &str = "12 rue de l'Industrie";
pub const DEFAULT_POSTAL_CODE: &str = "69007";
pub const DEFAULT_CITY: &str = "Lyon";
pub const DEFAULT_PHONE: &str = "04 78 00 00 00";
pub const DEFAULT_EMAIL: &str = "contact@atelier-jantes.fr";
pub const DEFAULT_WEBSITE: &str = "www.atelier-jantes.fr";
pub const DEFAULT_SIRET: &str = "000 000 000 00000";
pub const DEFAULT_TVA_NUMBER: &str = "FR00 000000000";
pub const DEFAULT_BANK_NAME: &str = "Banque Populaire";
pub const DEFAULT_IBAN: &str = "FR76 0000 0000 0000 0000 0000 000";
pub const DEFAULT_BIC: &str = "CCBPFRPPXXX";

/// Fully resolved issuer block. Only the logo may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInfo {
    pub name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub siret: String,
    pub tva_number: String,
    pub bank_name: String,
    pub iban: String,
    pub bic: String,
    pub logo_url: Option<String>,
}

impl CompanyInfo {
    pub fn city_line(&self) -> String {
        format!("{} {}", self.postal_code, self.city).trim().to_string()
    }
}

impl Default for CompanyInfo {
    fn default() -> Self {
        merge_with_defaults(None)
    }
}

/// Settings fields that are set and not blank win; every other field takes
/// its fallback constant.
pub fn merge_with_defaults(settings: Option<&ApplicationSettings>) -> CompanyInfo {
    let pick = |value: Option<&Option<String>>, fallback: &str| -> String {
        value
            .and_then(|v| v.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };

    CompanyInfo {
        name: pick(settings.map(|s| &s.company_name), DEFAULT_COMPANY_NAME),
        address: pick(settings.map(|s| &s.address), DEFAULT_ADDRESS),
        postal_code: pick(settings.map(|s| &s.postal_code), DEFAULT_POSTAL_CODE),
        city: pick(settings.map(|s| &s.city), DEFAULT_CITY),
        phone: pick(settings.map(|s| &s.phone), DEFAULT_PHONE),
        email: pick(settings.map(|s| &s.email), DEFAULT_EMAIL),
        website: pick(settings.map(|s| &s.website), DEFAULT_WEBSITE),
        siret: pick(settings.map(|s| &s.siret), DEFAULT_SIRET),
        tva_number: pick(settings.map(|s| &s.tva_number), DEFAULT_TVA_NUMBER),
        bank_name: pick(settings.map(|s| &s.bank_name), DEFAULT_BANK_NAME),
        iban: pick(settings.map(|s| &s.iban), DEFAULT_IBAN),
        bic: pick(settings.map(|s| &s.bic), DEFAULT_BIC),
        logo_url: settings
            .and_then(|s| s.logo_url.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_settings() {
        let info = merge_with_defaults(None);
        assert_eq!(info.name, DEFAULT_COMPANY_NAME);
        assert_eq!(info.iban, DEFAULT_IBAN);
        assert_eq!(info.logo_url, None);
    }

    #[test]
    fn test_settings_override_and_blank_fallback() {
        let settings = ApplicationSettings {
            company_name: Some("Jantes Pro".to_string()),
            iban: Some("  ".to_string()),
            logo_url: Some("https://cdn.example.fr/logo.png".to_string()),
            ..Default::default()
        };
        let info = merge_with_defaults(Some(&settings));
        assert_eq!(info.name, "Jantes Pro");
        assert_eq!(info.iban, DEFAULT_IBAN);
        assert_eq!(info.bic, DEFAULT_BIC);
        assert_eq!(info.logo_url.as_deref(), Some("https://cdn.example.fr/logo.png"));
    }
}
