//! Identity-scoped collection managers.
//!
//! A [`CollectionManager`] holds exactly one identity's collection in memory,
//! writes every mutation through to the shared [`CollectionStore`], and moves
//! between identities with save-then-load semantics.
//!
//! # Serialization
//!
//! All state lives behind one FIFO async mutex. An identity switch holds it for
//! the whole save/load sequence, so mutations that arrive mid-switch queue up
//! and are applied to the *incoming* identity once the switch completes; they
//! can never land in the outgoing identity's document.
//!
//! Readers never take the mutex: every change publishes a
//! [`CollectionSnapshot`] on a `watch` channel.
//!
//! # Unsaved collections
//!
//! When the save of an outgoing collection fails, the manager keeps that
//! collection aside instead of dropping it. Switching back to the identity
//! restores the kept copy (and retries its write) rather than reading the
//! stale stored document.

mod policy;
mod snapshot;

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};

use aurelia_core::{CollectionItem, Identity, ItemKey, NewItem, ProductId};

pub use policy::{Cart, CollectionPolicy, Wishlist};
pub use snapshot::{CollectionSnapshot, CollectionSummary};

use crate::error::{StoreError, capture_store_failure};
use crate::store::{CollectionStore, LoadStatus, StorageBackend};

/// Cart manager over backend `B`.
pub type CartManager<B> = CollectionManager<Cart, B>;

/// Wishlist manager over backend `B`.
pub type WishlistManager<B> = CollectionManager<Wishlist, B>;

/// Whether a write-through reached the store.
///
/// A failed write does not roll back the in-memory change; the caller decides
/// whether to retry or warn the shopper.
#[derive(Debug)]
pub enum Persistence {
    Saved,
    Failed(StoreError),
}

impl Persistence {
    /// Whether the write reached the store.
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }

    /// The storage error to surface as a warning, if any.
    #[must_use]
    pub const fn warning(&self) -> Option<&StoreError> {
        match self {
            Self::Saved => None,
            Self::Failed(err) => Some(err),
        }
    }
}

/// Result of [`CollectionManager::set_active_identity`].
#[derive(Debug)]
pub enum SwitchOutcome {
    /// Already active on the requested identity; no store I/O happened.
    Unchanged,
    /// The manager moved to the requested identity.
    Switched {
        /// Identity that was active before.
        from: Identity,
        /// Save of the outgoing identity's collection.
        saved: Persistence,
        /// Where the incoming identity's collection came from.
        incoming: Incoming,
    },
}

/// Source of the collection a switch moved to.
#[derive(Debug)]
pub enum Incoming {
    /// Read from the store.
    Loaded(LoadStatus),
    /// Restored from a copy whose earlier save failed; carries the retried
    /// write.
    Restored(Persistence),
}

impl Incoming {
    /// Whether the incoming collection hit a storage problem.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        match self {
            Self::Loaded(status) => status.is_degraded(),
            Self::Restored(persistence) => !persistence.is_saved(),
        }
    }
}

impl SwitchOutcome {
    /// Whether any part of the switch hit a storage problem.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        match self {
            Self::Unchanged => false,
            Self::Switched {
                saved, incoming, ..
            } => !saved.is_saved() || incoming.is_degraded(),
        }
    }
}

struct Active {
    identity: Identity,
    items: Vec<CollectionItem>,
    /// False until the first `set_active_identity` call settles who is shopping.
    resolved: bool,
    /// Collections whose save failed on the way out, by owner.
    unsaved: HashMap<Identity, Vec<CollectionItem>>,
}

/// One identity's cart or wishlist, persisted write-through.
pub struct CollectionManager<K, B> {
    store: Arc<CollectionStore<B>>,
    active: Mutex<Active>,
    snapshot: watch::Sender<CollectionSnapshot>,
    _policy: PhantomData<fn() -> K>,
}

impl<K, B> std::fmt::Debug for CollectionManager<K, B>
where
    K: CollectionPolicy,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.borrow();
        f.debug_struct("CollectionManager")
            .field("kind", &K::KIND)
            .field("identity", &snapshot.identity)
            .field("items", &snapshot.items.len())
            .field("is_loading", &snapshot.is_loading)
            .finish_non_exhaustive()
    }
}

impl<K: CollectionPolicy, B: StorageBackend> CollectionManager<K, B> {
    /// Open a manager on the guest identity, loading the guest's collection.
    ///
    /// A missing or unreadable guest document yields an empty collection. The
    /// manager reports `is_loading` until the first [`set_active_identity`]
    /// call, since the session may yet turn out to belong to a user. Mutations
    /// made before then apply to the guest collection.
    ///
    /// [`set_active_identity`]: Self::set_active_identity
    pub async fn open(store: Arc<CollectionStore<B>>) -> Self {
        let loaded = store.load(K::KIND, &Identity::Guest).await;
        if loaded.status.is_degraded() {
            tracing::warn!(kind = %K::KIND, status = ?loaded.status, "Guest collection unavailable, starting empty");
        }

        let (snapshot, _) = watch::channel(CollectionSnapshot::new(
            K::KIND,
            Identity::Guest,
            loaded.items.clone(),
            true,
        ));

        Self {
            store,
            active: Mutex::new(Active {
                identity: Identity::Guest,
                items: loaded.items,
                resolved: false,
                unsaved: HashMap::new(),
            }),
            snapshot,
            _policy: PhantomData,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The latest published state.
    #[must_use]
    pub fn snapshot(&self) -> CollectionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CollectionSnapshot> {
        self.snapshot.subscribe()
    }

    /// Items of the active identity.
    #[must_use]
    pub fn items(&self) -> Vec<CollectionItem> {
        self.snapshot.borrow().items.clone()
    }

    /// Whether an identity switch is in flight, or the first identity has not
    /// been settled yet.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.snapshot.borrow().is_loading
    }

    /// The identity whose collection is (or is about to be) shown.
    #[must_use]
    pub fn active_identity(&self) -> Identity {
        self.snapshot.borrow().identity.clone()
    }

    /// Item count and subtotal.
    #[must_use]
    pub fn summary(&self) -> CollectionSummary {
        self.snapshot.borrow().summary()
    }

    /// Whether a line with this product and size exists.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId, size: Option<&str>) -> bool {
        let key = ItemKey::new(product_id.clone(), size);
        self.snapshot.borrow().items.iter().any(|i| i.matches(&key))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a product, or fold it into the existing line with the same
    /// product and size.
    #[instrument(skip_all, fields(kind = %K::KIND, product_id = %candidate.product_id))]
    pub async fn add_item(&self, candidate: NewItem) -> Persistence {
        let mut active = self.active.lock().await;
        let key = candidate.key();

        if let Some(existing) = active.items.iter_mut().find(|i| i.matches(&key)) {
            if !K::merge(existing, &candidate) {
                debug!("Item already present, nothing to merge");
            }
        } else {
            let mut item = CollectionItem::from_new(candidate, Utc::now());
            K::prepare(&mut item);
            active.items.push(item);
        }

        self.commit(&active).await
    }

    /// Remove the line with this product and size, if present.
    #[instrument(skip_all, fields(kind = %K::KIND, product_id = %product_id))]
    pub async fn remove_item(&self, product_id: &ProductId, size: Option<&str>) -> Persistence {
        let mut active = self.active.lock().await;
        let key = ItemKey::new(product_id.clone(), size);

        if let Some(position) = active.items.iter().position(|i| i.matches(&key)) {
            active.items.remove(position);
        } else {
            debug!("No matching line to remove");
        }

        self.commit(&active).await
    }

    /// Empty the active identity's collection.
    #[instrument(skip_all, fields(kind = %K::KIND))]
    pub async fn clear(&self) -> Persistence {
        let mut active = self.active.lock().await;
        active.items.clear();
        self.commit(&active).await
    }

    /// Move to `identity`: save the current collection, then load the new one.
    ///
    /// Switching to the already-active identity performs no I/O. The outgoing
    /// collection is saved even when empty, so a cleared cart stays cleared.
    /// If that save fails the collection is kept in memory and restored when
    /// its owner becomes active again.
    #[instrument(skip_all, fields(kind = %K::KIND, to = %identity))]
    pub async fn set_active_identity(&self, identity: Identity) -> SwitchOutcome {
        let mut guard = self.active.lock().await;
        let active = &mut *guard;
        if active.identity == identity {
            debug!("Identity already active");
            if !active.resolved {
                active.resolved = true;
                self.publish(active, false);
            }
            return SwitchOutcome::Unchanged;
        }

        let from = active.identity.clone();
        let saved = self.persist(&from, &active.items).await;

        let outgoing = std::mem::take(&mut active.items);
        if !saved.is_saved() {
            warn!(from = %from, items = outgoing.len(), "Keeping unsaved collection in memory");
            active.unsaved.insert(from.clone(), outgoing);
        }
        active.identity = identity;
        active.resolved = true;
        self.publish_loading(&active.identity);

        let incoming = if let Some(items) = active.unsaved.remove(&active.identity) {
            let retried = self.persist(&active.identity, &items).await;
            active.items = items;
            Incoming::Restored(retried)
        } else {
            let loaded = self.store.load(K::KIND, &active.identity).await;
            active.items = loaded.items;
            Incoming::Loaded(loaded.status)
        };
        self.publish(active, false);

        info!(
            from = %from,
            items = active.items.len(),
            incoming = ?incoming,
            "Active identity switched"
        );

        SwitchOutcome::Switched {
            from,
            saved,
            incoming,
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn commit(&self, active: &Active) -> Persistence {
        let persistence = self.persist(&active.identity, &active.items).await;
        self.publish(active, !active.resolved);
        persistence
    }

    async fn persist(&self, identity: &Identity, items: &[CollectionItem]) -> Persistence {
        match self.store.save(K::KIND, identity, items).await {
            Ok(()) => Persistence::Saved,
            Err(err) => {
                capture_store_failure("save", &format!("{}:{identity}", K::KIND), &err);
                Persistence::Failed(err)
            }
        }
    }

    fn publish(&self, active: &Active, is_loading: bool) {
        self.snapshot.send_replace(CollectionSnapshot::new(
            K::KIND,
            active.identity.clone(),
            active.items.clone(),
            is_loading,
        ));
    }

    /// Show `identity` with no items while its collection is fetched.
    fn publish_loading(&self, identity: &Identity) {
        self.snapshot.send_replace(CollectionSnapshot::new(
            K::KIND,
            identity.clone(),
            Vec::new(),
            true,
        ));
    }
}

impl<B: StorageBackend> CollectionManager<Cart, B> {
    /// Set the quantity of a cart line; zero removes it.
    ///
    /// A missing line is left missing.
    #[instrument(skip_all, fields(kind = %Cart::KIND, product_id = %product_id, quantity = quantity))]
    pub async fn update_quantity(
        &self,
        product_id: &ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> Persistence {
        let mut active = self.active.lock().await;
        let key = ItemKey::new(product_id.clone(), size);

        if quantity == 0 {
            if let Some(position) = active.items.iter().position(|i| i.matches(&key)) {
                active.items.remove(position);
            }
        } else if let Some(item) = active.items.iter_mut().find(|i| i.matches(&key)) {
            item.quantity = quantity;
        } else {
            debug!("No matching line to update");
        }

        self.commit(&active).await
    }
}
