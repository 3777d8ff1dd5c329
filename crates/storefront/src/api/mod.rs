//! REST gateway for the storefront backend.
//!
//! # Architecture
//!
//! - [`Gateway`] is the seam every store talks through; it speaks raw JSON
//!   so that it stays object-safe and trivially fakeable.
//! - [`ApiClient`] is the `reqwest` implementation: base-URL joining,
//!   `Authorization: JWT <token>` header management, a per-request timeout
//!   and one silent retry for reads that fail in transport or with a 5xx.
//! - The backend is the source of truth; nothing here caches responses
//!   (catalog page caching lives in [`crate::catalog::ShopView`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use pzafira_storefront::api::{ApiClient, Gateway, decode, endpoints};
//!
//! let client = ApiClient::new(&config.api)?;
//! let page: Page<CartItem> = decode(client.get(endpoints::CART_ITEMS).await?)?;
//! ```

pub mod endpoints;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::session::SessionListener;

/// Delay before the silent retry of a failed read.
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Longest slice of a response body kept in error messages and logs.
const MAX_ERROR_BODY: usize = 200;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure: no response (connect error, timeout, reset).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the credentials (401).
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated, but not allowed to do this (403).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The backend rejected the request with a message (other 4xx).
    #[error("Validation error: {status} - {message}")]
    Validation { status: u16, message: String },

    /// The backend failed (5xx).
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The request path could not be turned into a URL.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl ApiError {
    /// Whether a read failing with this error may be retried silently.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Server { .. })
    }

    /// Whether the failure happened before any response arrived.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

/// The remote data gateway.
///
/// Paths are either relative to the API base URL (`/cart/api/cart-items/`)
/// or absolute URLs as returned in `next`/`previous` pagination links.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// GET a JSON document.
    async fn get(&self, path: &str) -> Result<Value, ApiError>;

    /// POST a JSON body, returning the created resource.
    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError>;

    /// PATCH a partial JSON body, returning the updated resource.
    async fn patch(&self, path: &str, body: &Value) -> Result<Value, ApiError>;

    /// PUT a full JSON body, returning the replaced resource.
    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError>;

    /// DELETE a resource.
    async fn delete(&self, path: &str) -> Result<(), ApiError>;
}

/// Decode a JSON document returned by the gateway.
///
/// # Errors
///
/// Returns `ApiError::Parse` if the document does not match `T`.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))
}

// =============================================================================
// ApiClient
// =============================================================================

/// `reqwest`-backed implementation of [`Gateway`].
///
/// Cheaply cloneable; clones share the HTTP connection pool and the token.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<SecretString>>,
    read_retries: u32,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        // Relative paths are joined below the base path, never replacing it.
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url,
                token: RwLock::new(config.token.clone()),
                read_retries: config.read_retries,
            }),
        })
    }

    /// The normalized base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Attach an access token to every subsequent request.
    pub fn set_token(&self, token: SecretString) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Stop sending an access token.
    pub fn clear_token(&self) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Whether an access token is currently attached.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Resolve a relative path or absolute pagination URL.
    fn url(&self, path: &str) -> Result<Url, ApiError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).map_err(|e| ApiError::InvalidPath(format!("{path}: {e}")));
        }
        self.inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidPath(format!("{path}: {e}")))
    }

    fn authorization(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|token| format!("JWT {}", token.expose_secret()))
    }

    /// Send one request and decode the JSON response.
    #[instrument(skip(self, body), fields(url = %url))]
    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Value, ApiError> {
        let mut request = self.inner.client.request(method, url);
        if let Some(auth) = self.authorization() {
            request = request.header(AUTHORIZATION, auth);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(parse_error(response).await);
        }

        let text = response.text().await?;
        debug!(status = %status, bytes = text.len(), "API response");

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            warn!(
                error = %e,
                body = %truncate(&text, MAX_ERROR_BODY),
                "Failed to parse API response"
            );
            ApiError::Parse(e.to_string())
        })
    }

    /// Send a read, retrying transport failures and 5xx responses.
    async fn read(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.url(path)?;
        let mut attempt = 0;
        loop {
            match self.send(Method::GET, url.clone(), None).await {
                Err(err) if err.is_retryable() && attempt < self.inner.read_retries => {
                    attempt += 1;
                    warn!(error = %err, attempt, path, "Retrying failed read");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl Gateway for ApiClient {
    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.read(path).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.send(Method::POST, self.url(path)?, Some(body)).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.send(Method::PATCH, self.url(path)?, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.send(Method::PUT, self.url(path)?, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, self.url(path)?, None).await.map(|_| ())
    }
}

impl SessionListener for ApiClient {
    fn on_logout(&self) {
        self.clear_token();
        debug!("Access token removed from API client");
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("authenticated", &self.has_token())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Error Parsing
// =============================================================================

/// Map a non-success response to an `ApiError`.
async fn parse_error(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return ApiError::RateLimited(retry_after);
    }

    if status == 401 {
        return ApiError::Unauthorized;
    }

    let url = response.url().path().to_string();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if status == 404 {
        return ApiError::NotFound(url);
    }

    let message = extract_message(&body);
    if status == 403 {
        return ApiError::Forbidden(message);
    }
    if status >= 500 {
        ApiError::Server { status, message }
    } else {
        ApiError::Validation { status, message }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands the backend's error shapes: a list of messages
/// (`["Not enough stock."]`), a `detail` object, or a field map
/// (`{"quantity": ["Ensure this value is greater than 0."]}`).
#[must_use]
pub fn extract_message(body: &str) -> String {
    fn first_string(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Array(items) => items.iter().find_map(first_string),
            Value::Object(map) => map
                .get("detail")
                .and_then(first_string)
                .or_else(|| map.values().find_map(first_string)),
            _ => None,
        }
    }

    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(first_string)
        .unwrap_or_else(|| truncate(body.trim(), MAX_ERROR_BODY))
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
