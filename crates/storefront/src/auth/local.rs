//! In-process identity provider.
//!
//! Accounts live in memory for the lifetime of the provider. Used for local
//! development and as the provider behind the session tests.

use std::collections::HashMap;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use aurelia_core::{Email, UserId};

use super::{AuthError, AuthEvent, AuthOutcome, AuthProvider, AuthSession, AuthSubscription};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Events buffered per subscriber before it is considered lagging.
const EVENT_CAPACITY: usize = 32;

const RESET_MESSAGE: &str = "If an account exists for that email, a reset link has been sent";

struct Account {
    user_id: UserId,
    password_hash: String,
}

/// Email/password accounts held in memory.
pub struct LocalAuthProvider {
    accounts: RwLock<HashMap<Email, Account>>,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
}

impl std::fmt::Debug for LocalAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAuthProvider")
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl Default for LocalAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuthProvider {
    /// Create a provider with no accounts and no session.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            accounts: RwLock::new(HashMap::new()),
            session: RwLock::new(None),
            events,
        }
    }

    /// Register an account without signing in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(AuthError::UserAlreadyExists);
        }

        let user_id = UserId::new(Uuid::new_v4().to_string());
        accounts.insert(
            email,
            Account {
                user_id: user_id.clone(),
                password_hash,
            },
        );
        Ok(user_id)
    }

    /// Verify credentials and start a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let email = Email::parse(email)?;

        let user_id = {
            let accounts = self.accounts.read().await;
            let account = accounts.get(&email).ok_or(AuthError::InvalidCredentials)?;
            verify_password(password, &account.password_hash)?;
            account.user_id.clone()
        };

        self.start_session(user_id.clone()).await;
        Ok(user_id)
    }

    /// Renew the current session's credentials.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoSession` when nobody is signed in.
    pub async fn refresh_session(&self) -> Result<AuthSession, AuthError> {
        let session = self.session.read().await.clone().ok_or(AuthError::NoSession)?;
        self.emit(AuthEvent::token_refreshed(session.user_id.clone()));
        Ok(session)
    }

    async fn start_session(&self, user_id: UserId) {
        *self.session.write().await = Some(AuthSession {
            user_id: user_id.clone(),
        });
        info!(user_id = %user_id, "Session started");
        self.emit(AuthEvent::signed_in(user_id));
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is not an error.
        if self.events.send(event).is_err() {
            debug!("No auth subscribers");
        }
    }

    async fn change_password(&self, new_password: &str) -> Result<(), AuthError> {
        let user_id = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.user_id.clone())
            .ok_or(AuthError::NoSession)?;
        validate_password(new_password)?;
        let password_hash = hash_password(new_password)?;

        let mut accounts = self.accounts.write().await;
        let account = accounts
            .values_mut()
            .find(|a| a.user_id == user_id)
            .ok_or(AuthError::NoSession)?;
        account.password_hash = password_hash;
        Ok(())
    }
}

impl AuthProvider for LocalAuthProvider {
    async fn current_session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.events.subscribe())
    }

    #[instrument(skip_all)]
    async fn sign_up(&self, email: &str, password: &str) -> AuthOutcome {
        let result = self.register(email, password).await;
        if let Ok(user_id) = &result {
            self.start_session(user_id.clone()).await;
        }
        result.map(|_| "Account created").into()
    }

    #[instrument(skip_all)]
    async fn sign_in(&self, email: &str, password: &str) -> AuthOutcome {
        self.authenticate(email, password)
            .await
            .map(|_| "Signed in")
            .into()
    }

    #[instrument(skip_all)]
    async fn sign_out(&self) -> AuthOutcome {
        let previous = self.session.write().await.take();
        if let Some(session) = previous {
            info!(user_id = %session.user_id, "Session ended");
            self.emit(AuthEvent::signed_out());
        }
        AuthOutcome::ok("Signed out")
    }

    async fn reset_password(&self, email: &str) -> AuthOutcome {
        match Email::parse(email) {
            Ok(email) => {
                let known = self.accounts.read().await.contains_key(&email);
                debug!(known, "Password reset requested");
                AuthOutcome::ok(RESET_MESSAGE)
            }
            Err(e) => AuthOutcome::failed(AuthError::from(e).to_string()),
        }
    }

    #[instrument(skip_all)]
    async fn update_password(&self, new_password: &str) -> AuthOutcome {
        self.change_password(new_password)
            .await
            .map(|()| "Password updated")
            .into()
    }

    async fn sign_in_with_provider(&self, provider: &str) -> AuthOutcome {
        AuthOutcome::failed(AuthError::ProviderNotConfigured(provider.to_owned()).to_string())
    }
}

// =============================================================================
// Password Helpers
// =============================================================================

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
