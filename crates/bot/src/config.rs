//! Bot configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TELEGRAM_BOT_TOKEN` - Telegram Bot API token
//! - `STRAPI_API_TOKEN` - Bearer token for the Strapi commerce backend
//!
//! ## Optional
//! - `STRAPI_BASE_URL` - Backend base URL (default: <http://localhost:1337>)
//! - `POND_SESSIONS_DIR` - Directory for session files (default: ./sessions)
//! - `POND_PAGE_SIZE` - Catalog page size for listing drains (default: 10)
//! - `POND_HTTP_TIMEOUT_SECS` - Per-call timeout for all remote HTTP
//!   requests (default: 10)

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Bot application configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram Bot API token.
    pub telegram_token: SecretString,
    /// Strapi commerce backend configuration.
    pub strapi: StrapiConfig,
    /// Directory where per-conversation session files are stored.
    pub sessions_dir: PathBuf,
    /// Catalog page size used when draining the product listing.
    pub page_size: u32,
}

/// Strapi backend configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct StrapiConfig {
    /// Backend base URL (e.g., <http://localhost:1337>).
    pub base_url: Url,
    /// Bearer token sent on every request.
    pub api_token: SecretString,
    /// Bounded per-call timeout; a stuck backend call must not hold a
    /// conversation worker indefinitely.
    pub http_timeout: Duration,
}

impl std::fmt::Debug for StrapiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrapiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &"[REDACTED]")
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl BotConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let telegram_token = get_required_secret("TELEGRAM_BOT_TOKEN")?;
        let strapi = StrapiConfig::from_env()?;
        let sessions_dir =
            PathBuf::from(get_env_or_default("POND_SESSIONS_DIR", "./sessions"));
        let page_size = get_env_or_default("POND_PAGE_SIZE", "10")
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidEnvVar("POND_PAGE_SIZE".to_string(), e.to_string()))
            .and_then(|n| {
                if n == 0 {
                    Err(ConfigError::InvalidEnvVar(
                        "POND_PAGE_SIZE".to_string(),
                        "must be positive".to_string(),
                    ))
                } else {
                    Ok(n)
                }
            })?;

        Ok(Self {
            telegram_token,
            strapi,
            sessions_dir,
            page_size,
        })
    }
}

impl StrapiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_env_or_default("STRAPI_BASE_URL", "http://localhost:1337")
            .parse::<Url>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STRAPI_BASE_URL".to_string(), e.to_string())
            })?;
        let api_token = get_required_secret("STRAPI_API_TOKEN")?;
        let timeout_secs = get_env_or_default("POND_HTTP_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("POND_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            base_url,
            api_token,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strapi_config_debug_redacts_token() {
        let config = StrapiConfig {
            base_url: "http://localhost:1337".parse().unwrap(),
            api_token: SecretString::from("super_secret_api_token"),
            http_timeout: Duration::from_secs(10),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("http://localhost:1337"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_api_token"));
    }

    #[test]
    fn test_get_env_or_default_falls_back() {
        assert_eq!(
            get_env_or_default("POND_TEST_UNSET_VARIABLE", "fallback"),
            "fallback"
        );
    }
}
