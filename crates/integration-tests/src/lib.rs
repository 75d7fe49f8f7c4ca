//! Integration test support for Aurelia collections.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p aurelia-integration-tests
//! ```
//!
//! Tests run against the memory and file backends; nothing here needs a
//! database.
//!
//! # Test Categories
//!
//! - `collection_scenarios` - identity switching, dedup and persistence
//! - `session_bridge` - auth events driving both managers
//! - `maintenance` - listing and purging stored collections

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;

use aurelia_core::{CurrencyCode, NewItem, ProductId, ProductType, UserId};
use aurelia_storefront::auth::AuthEvent;
use aurelia_storefront::collections::{CartManager, WishlistManager};
use aurelia_storefront::error::{Result, StoreError};
use aurelia_storefront::session::{SessionBridge, Transition};
use aurelia_storefront::store::{CollectionStore, MemoryBackend, StorageBackend};

/// Namespace used by every harness.
pub const NAMESPACE: &str = "aurelia-test";

// =============================================================================
// Recording Backend
// =============================================================================

/// One call made against a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Read(String),
    Write(String),
    Remove(String),
    Keys,
}

/// Backend wrapper that records call order and can inject failures.
#[derive(Debug, Default)]
pub struct RecordingBackend<B = MemoryBackend> {
    inner: B,
    ops: Mutex<Vec<Op>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl<B: StorageBackend> RecordingBackend<B> {
    #[must_use]
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            ops: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Calls recorded so far.
    pub fn ops(&self) -> Vec<Op> {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget recorded calls.
    pub fn reset(&self) {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub const fn inner(&self) -> &B {
        &self.inner
    }

    fn record(&self, op: Op) {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(op);
    }
}

impl<B: StorageBackend> StorageBackend for RecordingBackend<B> {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        self.record(Op::Read(key.to_owned()));
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".to_owned()));
        }
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.record(Op::Write(key.to_owned()));
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".to_owned()));
        }
        self.inner.write(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.record(Op::Remove(key.to_owned()));
        self.inner.remove(key).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.record(Op::Keys);
        self.inner.keys().await
    }
}

/// Storage key of `kind` for the guest, under [`NAMESPACE`].
#[must_use]
pub fn guest_key(kind: &str) -> String {
    format!("{NAMESPACE}:{kind}:guest")
}

/// Storage key of `kind` for `user`, under [`NAMESPACE`].
#[must_use]
pub fn user_key(kind: &str, user: &str) -> String {
    format!("{NAMESPACE}:{kind}:user:{user}")
}

// =============================================================================
// Harness
// =============================================================================

/// A store, both managers and a bridge wired together.
#[derive(Debug)]
pub struct Harness<B> {
    pub store: Arc<CollectionStore<B>>,
    pub bridge: Arc<SessionBridge<B>>,
}

impl<B: StorageBackend> Harness<B> {
    /// Open both managers on the guest identity over `backend`.
    ///
    /// # Panics
    ///
    /// Panics if [`NAMESPACE`] is rejected, which would be a bug in this crate.
    pub async fn new(backend: B) -> Self {
        let store = Arc::new(
            CollectionStore::new(backend, NAMESPACE).expect("test namespace is valid"),
        );
        let cart = Arc::new(CartManager::open(Arc::clone(&store)).await);
        let wishlist = Arc::new(WishlistManager::open(Arc::clone(&store)).await);
        let bridge = Arc::new(SessionBridge::new(cart, wishlist));
        Self { store, bridge }
    }

    #[must_use]
    pub fn cart(&self) -> &CartManager<B> {
        self.bridge.cart()
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistManager<B> {
        self.bridge.wishlist()
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        self.store.backend()
    }

    pub async fn start_as_guest(&self) -> Transition {
        self.bridge.handle(AuthEvent::initial(None)).await
    }

    pub async fn sign_in(&self, user: &str) -> Transition {
        self.bridge.handle(AuthEvent::signed_in(UserId::new(user))).await
    }

    pub async fn sign_out(&self) -> Transition {
        self.bridge.handle(AuthEvent::signed_out()).await
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// A $10 ring in `size`.
#[must_use]
pub fn ring(product: &str, size: Option<&str>) -> NewItem {
    item(product, ProductType::Ring, size, Decimal::new(10, 0))
}

/// A $120 necklace.
#[must_use]
pub fn necklace(product: &str) -> NewItem {
    item(product, ProductType::Necklace, None, Decimal::new(120, 0))
}

fn item(product: &str, product_type: ProductType, size: Option<&str>, price: Decimal) -> NewItem {
    NewItem {
        product_id: ProductId::new(product),
        product_type,
        name: format!("{product_type} {product}"),
        price,
        currency: CurrencyCode::USD,
        original_price: None,
        image: format!("https://cdn.aurelia.example/{product}.jpg"),
        material: "18k gold".to_owned(),
        stone: "emerald".to_owned(),
        size: size.map(str::to_owned),
        in_stock: true,
        quantity: 1,
    }
}
