//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `QUINCE_API_ROOT` - Root URL of the HAL API (e.g., <https://rest.api/server/api>)
//!
//! ## Optional
//! - `QUINCE_BEARER_TOKEN` - Bearer token attached to every request
//! - `QUINCE_MS_TO_LIVE` - Default cache lifetime in milliseconds (default: 900000)

use secrecy::SecretString;
use url::Url;

use crate::error::ConfigError;

const DEFAULT_MS_TO_LIVE: u64 = 900_000;

/// Client configuration.
///
/// Implements `Debug` manually to redact the bearer token.
#[derive(Clone)]
pub struct ClientConfig {
    /// Root URL of the HAL API. Endpoint discovery starts here.
    pub api_root: Url,
    /// Bearer token attached to every request, if any.
    pub bearer_token: Option<SecretString>,
    /// Default cache lifetime in milliseconds for cached objects and
    /// tracked request entries.
    pub ms_to_live: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_root", &self.api_root.as_str())
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[REDACTED]"))
            .field("ms_to_live", &self.ms_to_live)
            .finish()
    }
}

impl ClientConfig {
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

        let api_root = get_required_env("QUINCE_API_ROOT")?;
        let api_root = Url::parse(&api_root)
            .map_err(|e| ConfigError::InvalidEnvVar("QUINCE_API_ROOT".to_string(), e.to_string()))?;

        let bearer_token = get_optional_env("QUINCE_BEARER_TOKEN").map(SecretString::from);

        let ms_to_live = match get_optional_env("QUINCE_MS_TO_LIVE") {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar("QUINCE_MS_TO_LIVE".to_string(), e.to_string())
            })?,
            None => DEFAULT_MS_TO_LIVE,
        };

        Ok(Self {
            api_root,
            bearer_token,
            ms_to_live,
        })
    }

    /// A config pointing at `api_root` with defaults for everything else.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `api_root` is not a valid URL.
    pub fn for_api_root(api_root: &str) -> Result<Self, ConfigError> {
        let api_root = Url::parse(api_root)
            .map_err(|e| ConfigError::InvalidEnvVar("QUINCE_API_ROOT".to_string(), e.to_string()))?;
        Ok(Self {
            api_root,
            bearer_token: None,
            ms_to_live: DEFAULT_MS_TO_LIVE,
        })
    }
}

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
