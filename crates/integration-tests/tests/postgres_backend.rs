//! Collections persisted in `PostgreSQL`.
//!
//! These tests require a migrated database reachable through
//! `AURELIA_DATABASE_URL` (or `DATABASE_URL`).
//!
//! Run with: cargo test -p aurelia-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;

use aurelia_core::{CollectionKind, Identity, ProductId};
use aurelia_integration_tests::{Harness, necklace, ring};
use aurelia_storefront::config::database_url_from_env;
use aurelia_storefront::maintenance::{self, PurgeFilter};
use aurelia_storefront::store::{PgBackend, StorageBackend};

/// A harness over a fresh pool with this test namespace emptied.
async fn harness() -> Harness<PgBackend> {
    let url = database_url_from_env().unwrap();
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(url.expose_secret())
        .await
        .unwrap();
    let backend = PgBackend::from_pool(pool);
    sqlx::migrate!("../storefront/migrations")
        .run(backend.pool())
        .await
        .unwrap();

    let h = Harness::new(backend).await;
    maintenance::purge(&h.store, &PurgeFilter::all()).await.unwrap();
    h
}

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_switching_round_trips_through_postgres() {
    let h = harness().await;
    h.start_as_guest().await;

    h.cart().add_item(ring("g1", Some("M"))).await;
    h.sign_in("u1").await;
    h.wishlist().add_item(necklace("n1")).await;
    h.sign_out().await;

    assert_eq!(h.cart().items()[0].product_id, ProductId::new("g1"));

    h.sign_in("u1").await;
    assert!(h.cart().items().is_empty());
    assert_eq!(h.wishlist().items()[0].product_id, ProductId::new("n1"));

    let stored = h.store.load(CollectionKind::Wishlist, &Identity::user("u1")).await;
    assert_eq!(stored.items, h.wishlist().items());
}

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_remove_reports_whether_a_row_existed() {
    let h = harness().await;
    let key = h.store.key(CollectionKind::Cart, &Identity::user("gone")).unwrap();

    h.backend().write(key.as_str(), "[]").await.unwrap();
    assert_eq!(h.backend().read(key.as_str()).await.unwrap().as_deref(), Some("[]"));

    assert!(h.backend().remove(key.as_str()).await.unwrap());
    assert!(!h.backend().remove(key.as_str()).await.unwrap());
    assert_eq!(h.backend().read(key.as_str()).await.unwrap(), None);
}
