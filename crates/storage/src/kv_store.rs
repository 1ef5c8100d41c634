//! SQLite-backed key-value store

use crate::connection::{connect, connect_in_memory, DatabaseConfig, DbPool};
use crate::error::{StorageError, StorageResult};
use crate::migrations::run_migrations;
use chrono::Utc;
use marketsync_sync_engine::{async_trait, KeyValueStore, SyncResult};

/// Durable [`KeyValueStore`] over the `kv_store` table
///
/// Each `set` is a single upsert, so a write either lands completely or
/// not at all.
#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    pool: DbPool,
}

impl SqliteKvStore {
    /// Opens (and migrates) the database described by `config`
    pub async fn open(config: DatabaseConfig) -> StorageResult<Self> {
        let pool = connect(config).await?;
        Self::from_pool(pool).await
    }

    /// Opens a throwaway in-memory store
    pub async fn in_memory() -> StorageResult<Self> {
        let pool = connect_in_memory().await?;
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, running pending migrations
    pub async fn from_pool(pool: DbPool) -> StorageResult<Self> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Reads a value
    pub async fn get_value(&self, key: &str) -> StorageResult<Option<String>> {
        sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::database(format!("Failed to read '{}'", key), e))
    }

    /// Inserts or replaces a value
    pub async fn set_value(&self, key: &str, value: &str) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::database(format!("Failed to write '{}'", key), e))?;

        Ok(())
    }

    /// Deletes a value; missing keys are not an error
    pub async fn remove_value(&self, key: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::database(format!("Failed to delete '{}'", key), e))?;

        Ok(())
    }

    /// Milliseconds since the epoch when `key` was last written
    pub async fn updated_at(&self, key: &str) -> StorageResult<Option<i64>> {
        let updated: Option<Option<i64>> =
            sqlx::query_scalar("SELECT updated_at FROM kv_store WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::database("Failed to read timestamp", e))?;

        Ok(updated.flatten())
    }

    /// All stored keys, sorted
    pub async fn keys(&self) -> StorageResult<Vec<String>> {
        sqlx::query_scalar("SELECT key FROM kv_store ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::database("Failed to list keys", e))
    }

    /// Closes the pool, flushing the WAL
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.get_value(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        Ok(self.set_value(key, value).await?)
    }

    async fn remove(&self, key: &str) -> SyncResult<()> {
        Ok(self.remove_value(key).await?)
    }
}
