//! Unified error handling with Sentry integration.
//!
//! Provides a unified `StoreError` type returned by every store operation.
//! Operations have already turned the error into a user-visible notice by the
//! time the caller sees it; the `Result` exists for programmatic callers.

use thiserror::Error;

use crate::api::ApiError;
use crate::snapshot::SnapshotError;

/// Store-level error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Persisting or reading a snapshot failed.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Requested quantity is below one or above the available stock.
    #[error("Invalid quantity selected.")]
    InvalidQuantity { requested: u32, available: u32 },

    /// The selected variant has no stock.
    #[error("Selected variant is out of stock.")]
    OutOfStock,

    /// No variant was selected.
    #[error("Please select color and size!")]
    MissingVariant,
}

impl StoreError {
    /// Whether the backend rejected the credentials.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(ApiError::Unauthorized))
    }

    /// The message the backend attached to a rejected request, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api(ApiError::Validation { message, .. } | ApiError::Forbidden(message))
                if !message.is_empty() =>
            {
                Some(message)
            }
            _ => None,
        }
    }

    /// Report unexpected failures to Sentry.
    ///
    /// Client-side validation and rejected credentials are expected and not
    /// reported.
    pub fn capture(&self) {
        if matches!(
            self,
            Self::Snapshot(_) | Self::Api(ApiError::Server { .. } | ApiError::Parse(_))
        ) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Store operation error"
            );
        }
    }
}

/// Result type alias for `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user-visible events.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Item removed from cart.", sentry::Level::Info, Some(&[("item_id", "12")]));
/// ```
pub fn add_breadcrumb(
    category: &str,
    message: &str,
    level: sentry::Level,
    data: Option<&[(&str, &str)]>,
) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
