//! Collection storage configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `AURELIA_STORAGE_BACKEND` - `memory`, `file` or `postgres` (default: file)
//! - `AURELIA_DATA_DIR` - Directory for the file backend (default: .aurelia)
//! - `AURELIA_DATABASE_URL` - `PostgreSQL` connection string, required for the
//!   postgres backend (falls back to `DATABASE_URL`)
//! - `AURELIA_STORAGE_NAMESPACE` - Storage key namespace (default: aurelia)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

use aurelia_core::validate_namespace;

const DEFAULT_DATA_DIR: &str = ".aurelia";
const DEFAULT_NAMESPACE: &str = "aurelia";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Where collection documents are persisted.
#[derive(Clone)]
pub enum BackendConfig {
    /// Process-local map; nothing survives a restart.
    Memory,
    /// One JSON document per key in a directory on this device.
    File { data_dir: PathBuf },
    /// A `storefront.collection_document` table.
    Postgres { database_url: SecretString },
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::File { data_dir } => f
                .debug_struct("File")
                .field("data_dir", data_dir)
                .finish(),
            Self::Postgres { .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Collection storage configuration.
#[derive(Debug, Clone)]
pub struct CollectionsConfig {
    /// Storage backend selection
    pub backend: BackendConfig,
    /// Prefix of every storage key
    pub namespace: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. production, staging)
    pub sentry_environment: Option<String>,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Memory,
            namespace: DEFAULT_NAMESPACE.to_string(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl CollectionsConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is invalid or the postgres backend
    /// is selected without a database URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let backend = match get_env_or_default("AURELIA_STORAGE_BACKEND", "file")
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => BackendConfig::Memory,
            "file" => BackendConfig::File {
                data_dir: PathBuf::from(get_env_or_default("AURELIA_DATA_DIR", DEFAULT_DATA_DIR)),
            },
            "postgres" => BackendConfig::Postgres {
                database_url: get_database_url("AURELIA_DATABASE_URL")?,
            },
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "AURELIA_STORAGE_BACKEND".to_string(),
                    format!("expected memory, file or postgres (got {other:?})"),
                ));
            }
        };

        let namespace = get_env_or_default("AURELIA_STORAGE_NAMESPACE", DEFAULT_NAMESPACE);
        validate_namespace(&namespace).map_err(|e| {
            ConfigError::InvalidEnvVar("AURELIA_STORAGE_NAMESPACE".to_string(), e.to_string())
        })?;

        Ok(Self {
            backend,
            namespace,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

/// The Postgres URL used for migrations, regardless of the selected backend.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither `AURELIA_DATABASE_URL` nor
/// `DATABASE_URL` is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    let _ = dotenvy::dotenv();
    get_database_url("AURELIA_DATABASE_URL")
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_memory_backend() {
        let config = CollectionsConfig::default();
        assert!(matches!(config.backend, BackendConfig::Memory));
        assert_eq!(config.namespace, "aurelia");
    }

    #[test]
    fn test_backend_debug_redacts_database_url() {
        let backend = BackendConfig::Postgres {
            database_url: SecretString::from("postgres://shop:hunter2@db/shop"),
        };
        let debug_output = format!("{backend:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
    }

    #[test]
    fn test_file_backend_debug_shows_directory() {
        let backend = BackendConfig::File {
            data_dir: PathBuf::from("/var/lib/aurelia"),
        };
        assert!(format!("{backend:?}").contains("/var/lib/aurelia"));
    }

    #[test]
    fn test_get_env_or_default_uses_default_for_unset() {
        assert_eq!(
            get_env_or_default("AURELIA_TEST_SURELY_UNSET_VARIABLE", "fallback"),
            "fallback"
        );
    }
}
