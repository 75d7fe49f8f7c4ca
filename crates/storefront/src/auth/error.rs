//! Authentication error types.

use thiserror::Error;

/// Errors that can occur inside an authentication provider.
///
/// These never cross the provider boundary as errors; they are rendered into
/// an [`AuthOutcome`](super::AuthOutcome) message.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] aurelia_core::EmailError),

    /// Wrong password or unknown account.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("an account with this email already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// The operation needs a signed-in user.
    #[error("no active session")]
    NoSession,

    /// The external identity provider is not available.
    #[error("sign-in with {0} is not configured")]
    ProviderNotConfigured(String),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
