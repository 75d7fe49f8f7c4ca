//! Collection storage maintenance commands.
//!
//! # Usage
//!
//! ```bash
//! aurelia storage list --kind cart
//! aurelia storage show --kind wishlist --guest
//! aurelia storage purge --user 3f0c...
//! ```
//!
//! # Environment Variables
//!
//! - `AURELIA_STORAGE_BACKEND` - `file` (default), `postgres` or `memory`
//! - `AURELIA_DATA_DIR` - directory of the file backend
//! - `AURELIA_DATABASE_URL` - `PostgreSQL` connection string
//! - `AURELIA_STORAGE_NAMESPACE` - key namespace (default `aurelia`)

use thiserror::Error;

use aurelia_core::{CollectionKind, Identity};
use aurelia_storefront::config::{BackendConfig, CollectionsConfig};
use aurelia_storefront::error::StoreError;
use aurelia_storefront::maintenance::{self, PurgeFilter};
use aurelia_storefront::store::{Backend, CollectionStore};

/// Errors that can occur during storage maintenance.
#[derive(Debug, Error)]
pub enum StorageCommandError {
    /// The store could not be opened or queried.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

async fn open_store(
    config: &CollectionsConfig,
) -> Result<CollectionStore<Backend>, StorageCommandError> {
    if matches!(config.backend, BackendConfig::Memory) {
        tracing::warn!("Memory backend selected; there is nothing stored between runs");
    }
    tracing::info!(backend = ?config.backend, namespace = %config.namespace, "Opening collection store");

    let backend = Backend::open(&config.backend).await?;
    Ok(CollectionStore::new(backend, config.namespace.as_str())?)
}

/// List stored collections matching `filter`.
pub async fn list(
    config: &CollectionsConfig,
    filter: &PurgeFilter,
) -> Result<(), StorageCommandError> {
    let store = open_store(config).await?;
    let collections = maintenance::list(&store, filter).await?;

    #[allow(clippy::print_stdout)]
    {
        if collections.is_empty() {
            println!("No stored collections");
        }
        for collection in &collections {
            let count = collection
                .item_count
                .map_or_else(|| "malformed".to_owned(), |n| format!("{n} lines"));
            println!("{:<48} {count}", collection.key.as_str());
        }
    }
    Ok(())
}

/// Print the lines of one stored collection.
pub async fn show(
    config: &CollectionsConfig,
    kind: CollectionKind,
    identity: &Identity,
) -> Result<(), StorageCommandError> {
    let store = open_store(config).await?;
    let key = store.key(kind, identity)?;
    let loaded = store.load(kind, identity).await;

    #[allow(clippy::print_stdout)]
    {
        println!("{key} ({:?})", loaded.status);
        for item in &loaded.items {
            let size = item.size.as_deref().unwrap_or("-");
            let total = item
                .line_total()
                .map_or_else(|| "out of range".to_owned(), |price| price.to_string());
            println!(
                "  {:>3} x {:<32} size {:<4} {:>12}  [{}]",
                item.quantity,
                item.name,
                size,
                total,
                item.product_id
            );
        }
    }
    Ok(())
}

/// Delete stored collections matching `filter`.
pub async fn purge(
    config: &CollectionsConfig,
    filter: &PurgeFilter,
) -> Result<(), StorageCommandError> {
    let store = open_store(config).await?;
    let removed = maintenance::purge(&store, filter).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Removed {removed} stored collection(s)");
    }
    Ok(())
}
