//! Session lifecycle bridge.
//!
//! Translates authentication events into identity switches on the cart and
//! wishlist managers:
//!
//! | Event                          | Next state              |
//! |--------------------------------|-------------------------|
//! | `Initial` without a user       | `Guest`                 |
//! | `Initial` / `SignedIn` + user  | `Authenticated(user)`   |
//! | `SignedOut`                    | `Guest`                 |
//! | `TokenRefreshed` + user        | `Authenticated(user)`   |
//!
//! Events are handled one at a time. Both managers finish their switch before
//! the next event is looked at, and the bridge's state lock is held across
//! that whole window.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, instrument, warn};

use aurelia_core::{Identity, UserId};

use crate::auth::{AuthEvent, AuthEventKind, AuthOutcome, AuthProvider, AuthSubscription};
use crate::collections::{CartManager, SwitchOutcome, WishlistManager};
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::store::StorageBackend;

/// Where the bridge believes the session is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No event processed yet.
    #[default]
    Unknown,
    Guest,
    Authenticated(UserId),
}

impl SessionState {
    /// The identity the managers are scoped to in this state.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        match self {
            Self::Unknown => None,
            Self::Guest => Some(Identity::Guest),
            Self::Authenticated(user_id) => Some(Identity::User(user_id.clone())),
        }
    }
}

/// A pull-based stream of auth events.
pub trait AuthEventSource: Send {
    /// The next event, or `None` when the stream has ended.
    fn next_event(&mut self) -> impl Future<Output = Option<AuthEvent>> + Send;
}

impl AuthEventSource for mpsc::Receiver<AuthEvent> {
    async fn next_event(&mut self) -> Option<AuthEvent> {
        self.recv().await
    }
}

impl AuthEventSource for AuthSubscription {
    async fn next_event(&mut self) -> Option<AuthEvent> {
        self.recv().await
    }
}

/// What handling one event did.
#[derive(Debug)]
pub enum Transition {
    /// The event carried nothing actionable.
    Ignored { reason: &'static str },
    /// Both managers were pointed at the target state's identity.
    Applied {
        from: SessionState,
        to: SessionState,
        cart: SwitchOutcome,
        wishlist: SwitchOutcome,
    },
}

impl Transition {
    /// Whether either manager hit a storage problem while switching.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        match self {
            Self::Ignored { .. } => false,
            Self::Applied { cart, wishlist, .. } => cart.is_degraded() || wishlist.is_degraded(),
        }
    }
}

/// Drives both collection managers from authentication events.
pub struct SessionBridge<B> {
    cart: Arc<CartManager<B>>,
    wishlist: Arc<WishlistManager<B>>,
    state: Mutex<SessionState>,
}

impl<B> std::fmt::Debug for SessionBridge<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBridge").finish_non_exhaustive()
    }
}

impl<B: StorageBackend> SessionBridge<B> {
    /// Create a bridge in the `Unknown` state.
    #[must_use]
    pub fn new(cart: Arc<CartManager<B>>, wishlist: Arc<WishlistManager<B>>) -> Self {
        Self {
            cart,
            wishlist,
            state: Mutex::new(SessionState::Unknown),
        }
    }

    /// The current state. Waits for an in-flight transition to finish.
    pub async fn state(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    #[must_use]
    pub fn cart(&self) -> &Arc<CartManager<B>> {
        &self.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &Arc<WishlistManager<B>> {
        &self.wishlist
    }

    /// Apply one event.
    #[instrument(skip_all, fields(event = ?event.kind))]
    pub async fn handle(&self, event: AuthEvent) -> Transition {
        let mut state = self.state.lock().await;

        let Some(target) = next_state(&event) else {
            warn!(user_id = ?event.user_id, "Auth event without a user, ignoring");
            return Transition::Ignored {
                reason: "event carries no user",
            };
        };
        let Some(identity) = target.identity() else {
            return Transition::Ignored {
                reason: "no identity for target state",
            };
        };

        let (cart, wishlist) = tokio::join!(
            self.cart.set_active_identity(identity.clone()),
            self.wishlist.set_active_identity(identity.clone()),
        );

        match &target {
            SessionState::Authenticated(user_id) => set_sentry_user(user_id),
            _ => clear_sentry_user(),
        }

        let from = std::mem::replace(&mut *state, target.clone());
        if from == target {
            debug!(identity = %identity, "Session state unchanged");
        } else {
            let from_label = format!("{from:?}");
            let to_label = identity.to_string();
            add_breadcrumb(
                "session",
                "Identity switched",
                &[("from", from_label.as_str()), ("to", to_label.as_str())],
            );
            info!(from = ?from, to = %identity, "Session transition applied");
        }

        let transition = Transition::Applied {
            from,
            to: target,
            cart,
            wishlist,
        };
        if transition.is_degraded() {
            warn!(identity = %identity, "Session transition completed with storage problems");
        }
        transition
    }

    /// Apply the provider's current session as the `Initial` event.
    pub async fn bootstrap<A: AuthProvider>(&self, auth: &A) -> Transition {
        let user_id = auth.current_session().await.map(|s| s.user_id);
        self.handle(AuthEvent::initial(user_id)).await
    }

    /// Handle events from `source` until it ends.
    ///
    /// Subscribe before calling [`bootstrap`](Self::bootstrap) so nothing
    /// between the two is missed.
    pub async fn run<S: AuthEventSource>(&self, mut source: S) {
        while let Some(event) = source.next_event().await {
            self.handle(event).await;
        }
        debug!("Auth event stream ended");
    }

    /// Return both managers to the guest identity, then sign out.
    ///
    /// The departing user's collections are persisted before the provider is
    /// told, so nothing added up to this point is lost.
    pub async fn sign_out<A: AuthProvider>(&self, auth: &A) -> AuthOutcome {
        self.handle(AuthEvent::signed_out()).await;
        auth.sign_out().await
    }
}

fn next_state(event: &AuthEvent) -> Option<SessionState> {
    match (event.kind, &event.user_id) {
        (AuthEventKind::SignedOut, _) | (AuthEventKind::Initial, None) => Some(SessionState::Guest),
        (
            AuthEventKind::Initial | AuthEventKind::SignedIn | AuthEventKind::TokenRefreshed,
            Some(user_id),
        ) => Some(SessionState::Authenticated(user_id.clone())),
        (AuthEventKind::SignedIn | AuthEventKind::TokenRefreshed, None) => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use aurelia_core::{CurrencyCode, NewItem, ProductId, ProductType};

    use super::*;
    use crate::auth::LocalAuthProvider;
    use crate::store::{CollectionStore, MemoryBackend};

    async fn bridge() -> SessionBridge<MemoryBackend> {
        let store = Arc::new(CollectionStore::new(MemoryBackend::new(), "t").unwrap());
        let cart = Arc::new(CartManager::open(Arc::clone(&store)).await);
        let wishlist = Arc::new(WishlistManager::open(store).await);
        SessionBridge::new(cart, wishlist)
    }

    fn earring(product: &str) -> NewItem {
        NewItem {
            product_id: ProductId::new(product),
            product_type: ProductType::Earring,
            name: format!("Stud {product}"),
            price: Decimal::new(250, 0),
            currency: CurrencyCode::USD,
            original_price: None,
            image: String::new(),
            material: "gold".to_owned(),
            stone: "diamond".to_owned(),
            size: None,
            in_stock: true,
            quantity: 1,
        }
    }

    #[test]
    fn test_next_state_table() {
        let u1 = UserId::new("u1");

        assert_eq!(next_state(&AuthEvent::initial(None)), Some(SessionState::Guest));
        assert_eq!(
            next_state(&AuthEvent::initial(Some(u1.clone()))),
            Some(SessionState::Authenticated(u1.clone()))
        );
        assert_eq!(
            next_state(&AuthEvent::signed_in(u1.clone())),
            Some(SessionState::Authenticated(u1.clone()))
        );
        assert_eq!(next_state(&AuthEvent::signed_out()), Some(SessionState::Guest));
        assert_eq!(
            next_state(&AuthEvent::token_refreshed(u1.clone())),
            Some(SessionState::Authenticated(u1))
        );
        assert_eq!(
            next_state(&AuthEvent {
                kind: AuthEventKind::TokenRefreshed,
                user_id: None
            }),
            None
        );
    }

    #[tokio::test]
    async fn test_initial_guest_keeps_guest_collection() {
        let bridge = bridge().await;
        assert_eq!(bridge.state().await, SessionState::Unknown);
        assert!(bridge.cart().is_loading());
        assert!(bridge.wishlist().is_loading());

        let transition = bridge.handle(AuthEvent::initial(None)).await;
        assert!(matches!(
            transition,
            Transition::Applied {
                cart: SwitchOutcome::Unchanged,
                wishlist: SwitchOutcome::Unchanged,
                ..
            }
        ));
        assert_eq!(bridge.state().await, SessionState::Guest);
        assert!(!bridge.cart().is_loading());
        assert!(!bridge.wishlist().is_loading());
    }

    #[tokio::test]
    async fn test_sign_in_moves_both_managers() {
        let bridge = bridge().await;
        bridge.handle(AuthEvent::initial(None)).await;
        bridge.cart().add_item(earring("e1")).await;
        bridge.wishlist().add_item(earring("e2")).await;

        let u1 = UserId::new("u1");
        bridge.handle(AuthEvent::signed_in(u1.clone())).await;

        assert_eq!(bridge.state().await, SessionState::Authenticated(u1.clone()));
        assert_eq!(bridge.cart().active_identity(), Identity::User(u1.clone()));
        assert_eq!(bridge.wishlist().active_identity(), Identity::User(u1));
        assert!(bridge.cart().items().is_empty());
        assert!(bridge.wishlist().items().is_empty());
    }

    #[tokio::test]
    async fn test_token_refresh_for_current_user_is_idempotent() {
        let bridge = bridge().await;
        let u1 = UserId::new("u1");
        bridge.handle(AuthEvent::signed_in(u1.clone())).await;

        let transition = bridge.handle(AuthEvent::token_refreshed(u1)).await;
        assert!(matches!(
            transition,
            Transition::Applied {
                cart: SwitchOutcome::Unchanged,
                wishlist: SwitchOutcome::Unchanged,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_sign_in_without_user_is_ignored() {
        let bridge = bridge().await;
        let transition = bridge
            .handle(AuthEvent {
                kind: AuthEventKind::SignedIn,
                user_id: None,
            })
            .await;

        assert!(matches!(transition, Transition::Ignored { .. }));
        assert_eq!(bridge.state().await, SessionState::Unknown);
    }

    #[tokio::test]
    async fn test_run_processes_events_in_order() {
        let bridge = bridge().await;
        let (tx, rx) = mpsc::channel(8);

        tx.send(AuthEvent::initial(None)).await.unwrap();
        tx.send(AuthEvent::signed_in(UserId::new("u1"))).await.unwrap();
        tx.send(AuthEvent::signed_out()).await.unwrap();
        tx.send(AuthEvent::signed_in(UserId::new("u2"))).await.unwrap();
        drop(tx);

        bridge.run(rx).await;

        assert_eq!(
            bridge.state().await,
            SessionState::Authenticated(UserId::new("u2"))
        );
        assert_eq!(bridge.cart().active_identity(), Identity::user("u2"));
    }

    #[tokio::test]
    async fn test_sign_out_persists_user_collection_first() {
        let auth = LocalAuthProvider::new();
        auth.sign_up("ada@example.com", "correct horse").await;
        let user_id = auth.current_session().await.unwrap().user_id;

        let bridge = bridge().await;
        bridge.bootstrap(&auth).await;
        bridge.cart().add_item(earring("e1")).await;

        let outcome = bridge.sign_out(&auth).await;
        assert!(outcome.success);
        assert_eq!(bridge.state().await, SessionState::Guest);
        assert!(auth.current_session().await.is_none());

        bridge.handle(AuthEvent::signed_in(user_id)).await;
        assert_eq!(bridge.cart().items().len(), 1);
    }
}
