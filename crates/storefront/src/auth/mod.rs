//! Authentication collaborator.
//!
//! The collection layer only needs three things from authentication: the
//! session present at startup, a stream of session-change events, and a way to
//! sign out. [`AuthProvider`] exposes those alongside the account operations
//! the storefront forms call. [`LocalAuthProvider`] is an in-process
//! implementation with Argon2 password hashing.

mod error;
mod local;

use std::future::Future;

use tokio::sync::broadcast;
use tracing::warn;

use aurelia_core::UserId;

pub use error::AuthError;
pub use local::{LocalAuthProvider, MIN_PASSWORD_LENGTH};

/// Result of an account operation, shown to the shopper as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub success: bool,
    pub message: String,
}

impl AuthOutcome {
    /// A successful outcome.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl From<Result<&str, AuthError>> for AuthOutcome {
    fn from(result: Result<&str, AuthError>) -> Self {
        match result {
            Ok(message) => Self::ok(message),
            Err(err) => Self::failed(err.to_string()),
        }
    }
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: UserId,
}

/// What happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    /// The session as restored at startup.
    Initial,
    SignedIn,
    SignedOut,
    /// Credentials were renewed for the same session.
    TokenRefreshed,
}

/// A session-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    /// The signed-in user after the change, if any.
    pub user_id: Option<UserId>,
}

impl AuthEvent {
    #[must_use]
    pub const fn initial(user_id: Option<UserId>) -> Self {
        Self {
            kind: AuthEventKind::Initial,
            user_id,
        }
    }

    #[must_use]
    pub const fn signed_in(user_id: UserId) -> Self {
        Self {
            kind: AuthEventKind::SignedIn,
            user_id: Some(user_id),
        }
    }

    #[must_use]
    pub const fn signed_out() -> Self {
        Self {
            kind: AuthEventKind::SignedOut,
            user_id: None,
        }
    }

    #[must_use]
    pub const fn token_refreshed(user_id: UserId) -> Self {
        Self {
            kind: AuthEventKind::TokenRefreshed,
            user_id: Some(user_id),
        }
    }
}

/// A live subscription to session events. Dropping it unsubscribes.
#[derive(Debug)]
pub struct AuthSubscription {
    receiver: broadcast::Receiver<AuthEvent>,
}

impl AuthSubscription {
    /// Wrap the receiving half of a provider's event channel.
    #[must_use]
    pub const fn new(receiver: broadcast::Receiver<AuthEvent>) -> Self {
        Self { receiver }
    }

    /// The next event, or `None` once the provider is gone.
    ///
    /// If this subscriber fell behind, the skipped events are logged and the
    /// oldest retained event is returned; later events still describe the
    /// current session.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Auth subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// An identity provider.
///
/// Account operations never fail across this boundary: problems are reported
/// in the returned [`AuthOutcome`].
pub trait AuthProvider: Send + Sync {
    /// The session present right now, queried once at startup.
    fn current_session(&self) -> impl Future<Output = Option<AuthSession>> + Send;

    /// Subscribe to session-change events.
    fn subscribe(&self) -> AuthSubscription;

    fn sign_up(&self, email: &str, password: &str) -> impl Future<Output = AuthOutcome> + Send;

    fn sign_in(&self, email: &str, password: &str) -> impl Future<Output = AuthOutcome> + Send;

    fn sign_out(&self) -> impl Future<Output = AuthOutcome> + Send;

    /// Start a password reset for `email`.
    fn reset_password(&self, email: &str) -> impl Future<Output = AuthOutcome> + Send;

    /// Change the signed-in user's password.
    fn update_password(&self, new_password: &str) -> impl Future<Output = AuthOutcome> + Send;

    /// Sign in through an external provider such as `google`.
    fn sign_in_with_provider(&self, provider: &str) -> impl Future<Output = AuthOutcome> + Send;
}
