//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `PZAFIRA_API_BASE_URL` - Base URL of the REST backend (default: `http://127.0.0.1:8000`)
//! - `PZAFIRA_API_TOKEN` - Access token to restore a session with
//! - `PZAFIRA_STATE_PATH` - Snapshot database path (default: `~/.pzafira/state.redb`)
//! - `PZAFIRA_PAGE_SIZE` - Products per catalog page (default: 20)
//! - `PZAFIRA_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `PZAFIRA_READ_RETRIES` - Silent retries for read requests (default: 1)
//! - `PZAFIRA_CACHE_TTL_SECS` - Catalog page cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_READ_RETRIES: u32 = 1;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Upper bound on read retries.
const MAX_READ_RETRIES: u32 = 3;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Cannot determine a state directory; set PZAFIRA_STATE_PATH")]
    NoStateDir,
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// REST API connection settings
    pub api: ApiConfig,
    /// Path of the snapshot database
    pub state_path: PathBuf,
    /// Products per catalog page
    pub page_size: u32,
    /// Lifetime of cached catalog pages
    pub cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// REST API connection settings.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL every relative path is joined onto
    pub base_url: Url,
    /// Access token restored from the environment
    pub token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Silent retries for read requests
    pub read_retries: u32,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("read_retries", &self.read_retries)
            .finish()
    }
}

impl ApiConfig {
    /// Settings for a backend at `base_url` with default timeouts and no token.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            read_retries: DEFAULT_READ_RETRIES,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid, or if no
    /// state path can be determined.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = parse_base_url(&get_env_or_default("PZAFIRA_API_BASE_URL", DEFAULT_API_BASE_URL))?;
        let token = get_optional_env("PZAFIRA_API_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);
        let timeout = Duration::from_secs(get_parsed_or_default(
            "PZAFIRA_REQUEST_TIMEOUT_SECS",
            DEFAULT_TIMEOUT_SECS,
        )?);
        let read_retries =
            get_parsed_or_default("PZAFIRA_READ_RETRIES", DEFAULT_READ_RETRIES)?.min(MAX_READ_RETRIES);

        let state_path = match get_optional_env("PZAFIRA_STATE_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_state_path()?,
        };

        let page_size = get_parsed_or_default("PZAFIRA_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PZAFIRA_PAGE_SIZE".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let cache_ttl = Duration::from_secs(get_parsed_or_default(
            "PZAFIRA_CACHE_TTL_SECS",
            DEFAULT_CACHE_TTL_SECS,
        )?);

        Ok(Self {
            api: ApiConfig {
                base_url,
                token,
                timeout,
                read_retries,
            },
            state_path,
            page_size,
            cache_ttl,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }

    /// Configuration for a backend at `base_url`, keeping snapshots at `state_path`.
    #[must_use]
    pub const fn new(base_url: Url, state_path: PathBuf) -> Self {
        Self {
            api: ApiConfig::new(base_url),
            state_path,
            page_size: DEFAULT_PAGE_SIZE,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            sentry_dsn: None,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse the API base URL, requiring an http(s) scheme.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("PZAFIRA_API_BASE_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "PZAFIRA_API_BASE_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// `~/.pzafira/state.redb`.
fn default_state_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoStateDir)?;
    Ok(home.join(".pzafira").join("state.redb"))
}
