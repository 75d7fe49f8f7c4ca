//! Storage error type and Sentry integration.
//!
//! Storage failures never cross the collection-manager boundary as errors:
//! managers log them, capture them to Sentry and hand them back to the caller
//! as a warning value. The helpers here keep that reporting in one place.

use thiserror::Error;

use aurelia_core::StorageKeyError;

/// Errors raised by storage backends and the collection store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A collection could not be serialized.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A storage key could not be derived.
    #[error("Invalid key: {0}")]
    InvalidKey(#[from] StorageKeyError),

    /// The backend refused the operation.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Report a recoverable storage failure.
///
/// Logs a warning and captures the error to Sentry.
pub fn capture_store_failure(operation: &str, target: &str, err: &StoreError) {
    let event_id = sentry::capture_error(err);
    tracing::warn!(
        operation,
        target,
        error = %err,
        sentry_event_id = %event_id,
        "Storage operation failed; in-memory state remains authoritative"
    );
}

/// Set the Sentry user context from a user ID.
///
/// Called when the session bridge moves to an authenticated identity.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Called when the session bridge returns to the guest identity.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a state transition.
///
/// Breadcrumbs appear in Sentry error reports to show the identity switches
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Unavailable("disk full".to_string());
        assert_eq!(err.to_string(), "Storage unavailable: disk full");

        let err = StoreError::from(StorageKeyError::EmptyUserId);
        assert_eq!(err.to_string(), "Invalid key: user id cannot be empty");
    }

    #[test]
    fn test_capture_without_client_is_harmless() {
        // Without an initialised Sentry client these are no-ops.
        let err = StoreError::Unavailable("offline".to_string());
        capture_store_failure("write", "shop:cart:guest", &err);
        add_breadcrumb("session", "switched", &[("identity", "guest")]);
        set_sentry_user(&"u1");
        clear_sentry_user();
    }
}
