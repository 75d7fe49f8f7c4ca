//! Persistent collection store.
//!
//! Two layers:
//!
//! - [`StorageBackend`] - an untyped, async key/value store of strings (the
//!   device-local storage analogue). Implementations: [`MemoryBackend`],
//!   [`FileBackend`], [`PgBackend`], and the config-selected [`Backend`].
//! - [`CollectionStore`] - derives namespaced keys from `(kind, identity)` and
//!   (de)serializes collection documents on top of a backend.
//!
//! The cart and wishlist managers share one `CollectionStore`; their key
//! spaces are disjoint by construction, so the store needs no locking of its
//! own beyond what each backend does internally.

mod file;
mod memory;
mod postgres;

use std::future::Future;

use tracing::{debug, instrument, warn};

use aurelia_core::{CollectionItem, CollectionKind, Identity, StorageKey};

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use postgres::PgBackend;

use crate::config::BackendConfig;
use crate::error::{Result, StoreError, capture_store_failure};

/// Untyped async key/value storage.
///
/// Methods take `&self`; implementations use interior mutability.
pub trait StorageBackend: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Insert or replace the value under `key`.
    fn write(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;

    /// Remove `key`. Returns whether it existed.
    fn remove(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// All keys currently stored, in no particular order.
    fn keys(&self) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// A backend selected at runtime from [`BackendConfig`].
#[derive(Debug)]
pub enum Backend {
    Memory(MemoryBackend),
    File(FileBackend),
    Postgres(PgBackend),
}

impl Backend {
    /// Open the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the data directory cannot be created, or
    /// `StoreError::Database` if the database is unreachable.
    pub async fn open(config: &BackendConfig) -> Result<Self> {
        Ok(match config {
            BackendConfig::Memory => Self::Memory(MemoryBackend::new()),
            BackendConfig::File { data_dir } => Self::File(FileBackend::open(data_dir).await?),
            BackendConfig::Postgres { database_url } => {
                Self::Postgres(PgBackend::connect(database_url).await?)
            }
        })
    }
}

impl StorageBackend for Backend {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        match self {
            Self::Memory(b) => b.read(key).await,
            Self::File(b) => b.read(key).await,
            Self::Postgres(b) => b.read(key).await,
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        match self {
            Self::Memory(b) => b.write(key, value).await,
            Self::File(b) => b.write(key, value).await,
            Self::Postgres(b) => b.write(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        match self {
            Self::Memory(b) => b.remove(key).await,
            Self::File(b) => b.remove(key).await,
            Self::Postgres(b) => b.remove(key).await,
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        match self {
            Self::Memory(b) => b.keys().await,
            Self::File(b) => b.keys().await,
            Self::Postgres(b) => b.keys().await,
        }
    }
}

/// How a collection load resolved.
#[derive(Debug)]
pub enum LoadStatus {
    /// A well-formed document was found.
    Found,
    /// No document exists for this identity yet.
    Missing,
    /// A document exists but could not be parsed; treated as absent.
    Malformed(serde_json::Error),
    /// The backend failed; treated as absent for this process.
    Failed(StoreError),
}

impl LoadStatus {
    /// Whether the load fell back to an empty collection because of a problem
    /// worth surfacing (as opposed to a first visit).
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::Failed(_))
    }
}

/// Items loaded for one identity, plus how the load resolved.
///
/// `items` is empty for every status except `Found`.
#[derive(Debug)]
pub struct Loaded {
    pub items: Vec<CollectionItem>,
    pub status: LoadStatus,
}

impl Loaded {
    fn empty(status: LoadStatus) -> Self {
        Self {
            items: Vec::new(),
            status,
        }
    }
}

/// Typed collection documents on top of a [`StorageBackend`].
#[derive(Debug)]
pub struct CollectionStore<B> {
    backend: B,
    namespace: String,
}

impl<B: StorageBackend> CollectionStore<B> {
    /// Wrap `backend`, namespacing every key under `namespace`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidKey` if the namespace is unusable.
    pub fn new(backend: B, namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        aurelia_core::validate_namespace(&namespace)?;
        Ok(Self { backend, namespace })
    }

    /// The key namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The underlying backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Derive the storage key for a collection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidKey` for an empty user ID.
    pub fn key(&self, kind: CollectionKind, identity: &Identity) -> Result<StorageKey> {
        Ok(StorageKey::new(&self.namespace, kind, identity)?)
    }

    /// Load the collection of `identity`.
    ///
    /// Never fails: missing, malformed and unreadable documents are reported
    /// through [`LoadStatus`] and all mean "start empty".
    #[instrument(skip_all, fields(kind = %kind, identity = %identity))]
    pub async fn load(&self, kind: CollectionKind, identity: &Identity) -> Loaded {
        let key = match self.key(kind, identity) {
            Ok(key) => key,
            Err(e) => return Loaded::empty(LoadStatus::Failed(e)),
        };

        match self.backend.read(key.as_str()).await {
            Ok(None) => {
                debug!(key = %key, "No stored collection, starting empty");
                Loaded::empty(LoadStatus::Missing)
            }
            Ok(Some(document)) => match serde_json::from_str(&document) {
                Ok(items) => Loaded {
                    items,
                    status: LoadStatus::Found,
                },
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding malformed collection document");
                    Loaded::empty(LoadStatus::Malformed(e))
                }
            },
            Err(e) => {
                capture_store_failure("load", key.as_str(), &e);
                Loaded::empty(LoadStatus::Failed(e))
            }
        }
    }

    /// Persist the collection of `identity`, replacing any previous document.
    ///
    /// An empty `items` is written as an empty document, not skipped.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if serialization or the backend write fails.
    #[instrument(skip_all, fields(kind = %kind, identity = %identity, len = items.len()))]
    pub async fn save(
        &self,
        kind: CollectionKind,
        identity: &Identity,
        items: &[CollectionItem],
    ) -> Result<()> {
        let key = self.key(kind, identity)?;
        let document = serde_json::to_string(items)?;
        self.backend.write(key.as_str(), &document).await
    }

    /// Every key in this namespace that parses as a collection key.
    ///
    /// Keys of other namespaces and unparseable keys are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot enumerate keys.
    pub async fn stored_keys(&self) -> Result<Vec<StorageKey>> {
        let mut keys: Vec<StorageKey> = self
            .backend
            .keys()
            .await?
            .iter()
            .filter_map(|raw| StorageKey::parse(&self.namespace, raw).ok())
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Remove the document stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend removal fails.
    pub async fn remove(&self, key: &StorageKey) -> Result<bool> {
        self.backend.remove(key.as_str()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store() -> CollectionStore<MemoryBackend> {
        CollectionStore::new(MemoryBackend::new(), "test").unwrap()
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let store = store();
        let loaded = store.load(CollectionKind::Cart, &Identity::user("new")).await;
        assert!(matches!(loaded.status, LoadStatus::Missing));
        assert!(!loaded.status.is_degraded());
        assert!(loaded.items.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_document_is_treated_as_absent() {
        let store = store();
        store
            .backend()
            .write("test:cart:guest", "{not json")
            .await
            .unwrap();

        let loaded = store.load(CollectionKind::Cart, &Identity::Guest).await;
        assert!(matches!(loaded.status, LoadStatus::Malformed(_)));
        assert!(loaded.status.is_degraded());
        assert!(loaded.items.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_shape_is_malformed() {
        let store = store();
        store
            .backend()
            .write("test:wishlist:guest", r#"{"items": []}"#)
            .await
            .unwrap();

        let loaded = store.load(CollectionKind::Wishlist, &Identity::Guest).await;
        assert!(matches!(loaded.status, LoadStatus::Malformed(_)));
    }

    #[tokio::test]
    async fn test_empty_save_writes_document() {
        let store = store();
        store
            .save(CollectionKind::Cart, &Identity::Guest, &[])
            .await
            .unwrap();

        let raw = store.backend().read("test:cart:guest").await.unwrap();
        assert_eq!(raw.as_deref(), Some("[]"));
        let loaded = store.load(CollectionKind::Cart, &Identity::Guest).await;
        assert!(matches!(loaded.status, LoadStatus::Found));
        assert!(loaded.items.is_empty());
    }

    #[tokio::test]
    async fn test_stored_keys_skips_foreign_namespaces() {
        let store = store();
        store
            .save(CollectionKind::Cart, &Identity::user("u1"), &[])
            .await
            .unwrap();
        store.backend().write("other:cart:guest", "[]").await.unwrap();
        store.backend().write("theme", "dark").await.unwrap();

        let keys = store.stored_keys().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].identity(), &Identity::user("u1"));
    }
}
