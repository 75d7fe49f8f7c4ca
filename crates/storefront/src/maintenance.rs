//! Storage cleanup utilities.
//!
//! Guest and user collections are never deleted automatically. These helpers
//! let an operator inspect what is stored under a namespace and remove
//! selected documents. Keys belonging to other namespaces, or that do not
//! parse as collection keys, are never touched.

use tracing::{info, instrument, warn};

use aurelia_core::{CollectionKind, Identity, StorageKey, UserId};

use crate::error::Result;
use crate::store::{CollectionStore, LoadStatus, StorageBackend};

/// Which identities a filter selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityFilter {
    Guest,
    User(UserId),
    All,
}

/// Selects stored collections by kind and identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeFilter {
    /// `None` selects both carts and wishlists.
    pub kind: Option<CollectionKind>,
    pub identity: IdentityFilter,
}

impl PurgeFilter {
    /// Every collection in the namespace.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            kind: None,
            identity: IdentityFilter::All,
        }
    }

    /// Guest collections only.
    #[must_use]
    pub const fn guest() -> Self {
        Self {
            kind: None,
            identity: IdentityFilter::Guest,
        }
    }

    /// One user's collections.
    #[must_use]
    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self {
            kind: None,
            identity: IdentityFilter::User(user_id.into()),
        }
    }

    /// Restrict to one kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: CollectionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Whether `key` is selected.
    #[must_use]
    pub fn matches(&self, key: &StorageKey) -> bool {
        if self.kind.is_some_and(|kind| kind != key.kind()) {
            return false;
        }
        match (&self.identity, key.identity()) {
            (IdentityFilter::All, _) | (IdentityFilter::Guest, Identity::Guest) => true,
            (IdentityFilter::User(wanted), Identity::User(user_id)) => wanted == user_id,
            _ => false,
        }
    }
}

/// One stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCollection {
    pub key: StorageKey,
    /// Number of lines, or `None` if the document is malformed.
    pub item_count: Option<usize>,
}

impl StoredCollection {
    #[must_use]
    pub const fn kind(&self) -> CollectionKind {
        self.key.kind()
    }

    #[must_use]
    pub const fn identity(&self) -> &Identity {
        self.key.identity()
    }
}

/// List the collections `filter` selects, in key order.
///
/// # Errors
///
/// Returns `StoreError` if keys cannot be enumerated or a document cannot be
/// read.
#[instrument(skip_all, fields(namespace = store.namespace()))]
pub async fn list<B: StorageBackend>(
    store: &CollectionStore<B>,
    filter: &PurgeFilter,
) -> Result<Vec<StoredCollection>> {
    let mut collections = Vec::new();

    for key in store.stored_keys().await? {
        if !filter.matches(&key) {
            continue;
        }

        let loaded = store.load(key.kind(), key.identity()).await;
        let item_count = match loaded.status {
            LoadStatus::Found | LoadStatus::Missing => Some(loaded.items.len()),
            LoadStatus::Malformed(_) => None,
            LoadStatus::Failed(e) => return Err(e),
        };
        collections.push(StoredCollection { key, item_count });
    }

    Ok(collections)
}

/// Remove the collections `filter` selects. Returns how many were removed.
///
/// # Errors
///
/// Returns `StoreError` on the first failed enumeration or removal; documents
/// removed before the failure stay removed.
#[instrument(skip_all, fields(namespace = store.namespace()))]
pub async fn purge<B: StorageBackend>(
    store: &CollectionStore<B>,
    filter: &PurgeFilter,
) -> Result<usize> {
    let mut removed = 0;

    for key in store.stored_keys().await? {
        if !filter.matches(&key) {
            continue;
        }
        if store.remove(&key).await? {
            removed += 1;
        } else {
            warn!(key = %key, "Collection vanished before it could be removed");
        }
    }

    info!(removed, filter = ?filter, "Purged stored collections");
    Ok(removed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;

    async fn seeded() -> CollectionStore<MemoryBackend> {
        let store = CollectionStore::new(MemoryBackend::new(), "shop").unwrap();
        let backend = store.backend();
        backend.write("shop:cart:guest", "[]").await.unwrap();
        backend.write("shop:wishlist:guest", "[]").await.unwrap();
        backend.write("shop:cart:user:u1", "[]").await.unwrap();
        backend.write("shop:wishlist:user:u1", "not json").await.unwrap();
        backend.write("shop:cart:user:u2", "[]").await.unwrap();
        backend.write("other:cart:guest", "[]").await.unwrap();
        backend.write("shop:unrelated", "x").await.unwrap();
        store
    }

    #[test]
    fn test_filter_matches() {
        let key = StorageKey::new("shop", CollectionKind::Cart, &Identity::user("u1")).unwrap();

        assert!(PurgeFilter::all().matches(&key));
        assert!(PurgeFilter::user("u1").matches(&key));
        assert!(!PurgeFilter::user("u2").matches(&key));
        assert!(!PurgeFilter::guest().matches(&key));
        assert!(!PurgeFilter::all().with_kind(CollectionKind::Wishlist).matches(&key));
    }

    #[tokio::test]
    async fn test_list_reports_counts_and_malformed() {
        let store = seeded().await;

        let listed = list(&store, &PurgeFilter::user("u1")).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].kind(), CollectionKind::Cart);
        assert_eq!(listed[0].item_count, Some(0));
        assert_eq!(listed[1].kind(), CollectionKind::Wishlist);
        assert_eq!(listed[1].item_count, None);
    }

    #[tokio::test]
    async fn test_purge_guest_only() {
        let store = seeded().await;

        let removed = purge(&store, &PurgeFilter::guest()).await.unwrap();
        assert_eq!(removed, 2);

        let remaining = list(&store, &PurgeFilter::all()).await.unwrap();
        assert!(remaining.iter().all(|c| !c.identity().is_guest()));
    }

    #[tokio::test]
    async fn test_purge_all_leaves_foreign_keys() {
        let store = seeded().await;

        let removed = purge(&store, &PurgeFilter::all()).await.unwrap();
        assert_eq!(removed, 5);

        let backend = store.backend();
        assert!(backend.read("other:cart:guest").await.unwrap().is_some());
        assert!(backend.read("shop:unrelated").await.unwrap().is_some());
    }
}
