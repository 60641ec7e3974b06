use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct WorkshopConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreConfig,
    pub pdf: PdfConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Present when the backend is PostgreSQL.
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PdfConfig {
    /// Logo used when the application settings carry none.
    pub default_logo_url: Option<String>,
    pub logo_timeout_secs: u64,
}

impl WorkshopConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let is_prod = environment == Environment::Prod;

        let backend: StoreBackend = get_env("STORE_BACKEND", Some("postgres"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let database = match backend {
            StoreBackend::Memory => None,
            StoreBackend::Postgres => Some(DatabaseConfig {
                url: Secret::new(get_env("DATABASE_URL", None, is_prod)?),
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), false)?
                    .parse()
                    .unwrap_or(10),
                min_connections: get_env("DATABASE_MIN_CONNECTIONS", Some("1"), false)?
                    .parse()
                    .unwrap_or(1),
                run_migrations: parse_bool(&get_env("DATABASE_RUN_MIGRATIONS", Some("true"), false)?),
            }),
        };

        let config = WorkshopConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("workshop-service"), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: optional_env("OTLP_ENDPOINT"),
            store: StoreConfig { backend, database },
            pdf: PdfConfig {
                default_logo_url: optional_env("PDF_DEFAULT_LOGO_URL"),
                logo_timeout_secs: get_env("PDF_LOGO_TIMEOUT_SECS", Some("5"), false)?
                    .parse()
                    .unwrap_or(5),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// In-memory configuration on an ephemeral port.
    pub fn for_tests() -> Self {
        Self {
            common: core_config::Config {
                port: 0,
                environment: "dev".to_string(),
            },
            environment: Environment::Dev,
            service_name: "workshop-service".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database: None,
            },
            pdf: PdfConfig {
                default_logo_url: None,
                logo_timeout_secs: 1,
            },
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        if let Some(db) = &self.store.database {
            if db.max_connections == 0 {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_MAX_CONNECTIONS must be greater than 0"
                )));
            }
            if db.min_connections > db.max_connections {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_MIN_CONNECTIONS cannot exceed DATABASE_MAX_CONNECTIONS"
                )));
            }
        }

        if self.environment == Environment::Prod && self.store.backend == StoreBackend::Memory {
            tracing::warn!("Memory store selected in production - data will not survive restarts");
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_environment_and_backend() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Prod));
        assert!("staging".parse::<Environment>().is_err());
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("PostgreSQL".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert!("mongo".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" Yes "));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_get_env_defaults_outside_production() {
        let key = "WORKSHOP_TEST_SURELY_UNSET_KEY";
        assert_eq!(get_env(key, Some("5"), false).unwrap(), "5");
        assert!(get_env(key, Some("5"), true).is_err());
        assert!(get_env(key, None, false).is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_pool() {
        let mut config = WorkshopConfig::for_tests();
        config.store.backend = StoreBackend::Postgres;
        config.store.database = Some(DatabaseConfig {
            url: Secret::new("postgres://localhost/workshop".to_string()),
            max_connections: 2,
            min_connections: 5,
            run_migrations: false,
        });
        assert!(config.validate().is_err());
    }
}
