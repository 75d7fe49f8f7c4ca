//! `PostgreSQL` storage backend.
//!
//! # Table: `storefront.collection_document`
//!
//! One row per storage key. The document is stored as `TEXT` rather than
//! `JSONB` so a corrupt document can still be read back and reported as
//! malformed instead of failing the query.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p aurelia-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::StorageBackend;
use crate::error::Result;

/// Key/value store over a `PostgreSQL` table.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Connect with a small pool.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the connection cannot be established.
    pub async fn connect(database_url: &SecretString) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url.expose_secret())
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, e.g. for running migrations.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl StorageBackend for PgBackend {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            r"
            SELECT document
            FROM storefront.collection_document
            WHERE storage_key = $1
            ",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.try_get::<String, _>("document")).transpose()?)
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO storefront.collection_document (storage_key, document)
            VALUES ($1, $2)
            ON CONFLICT (storage_key)
            DO UPDATE SET document = EXCLUDED.document, updated_at = NOW()
            ",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let result = sqlx::query(
            r"
            DELETE FROM storefront.collection_document
            WHERE storage_key = $1
            ",
        )
        .bind(key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT storage_key FROM storefront.collection_document")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| r.try_get::<String, _>("storage_key").map_err(Into::into))
            .collect()
    }
}
