// crates/sync-engine/src/store.rs
//! Durable storage for the mutation queue

use crate::error::{SyncError, SyncResult};
use crate::types::QueueItem;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Default key for the serialized queue
pub const DEFAULT_QUEUE_KEY: &str = "marketsync.offline_queue";

/// Default key for the last successful sync timestamp
pub const DEFAULT_LAST_SYNC_KEY: &str = "marketsync.last_sync";

/// String-keyed blob storage that survives restarts
///
/// A `set` must be atomic for readers: `get` sees either the old or the new
/// value, never a partial write.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value
    async fn get(&self, key: &str) -> SyncResult<Option<String>>;

    /// Writes a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> SyncResult<()>;

    /// Deletes a value; deleting a missing key is not an error
    async fn remove(&self, key: &str) -> SyncResult<()>;
}

/// Volatile key-value store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with one entry
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(key.into(), value.into());
        }
        store
    }

    /// Reads a value without going through the async interface
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| SyncError::Storage("Lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SyncError::Storage("Lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> SyncResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SyncError::Storage("Lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Key-value store whose writes can be switched off
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    rejecting: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl FlakyStore {
    /// Makes every following `set` fail (or succeed again)
    pub(crate) fn reject_writes(&self, reject: bool) {
        self.rejecting
            .store(reject, std::sync::atomic::Ordering::SeqCst);
    }

    pub(crate) fn peek(&self, key: &str) -> Option<String> {
        self.inner.peek(key)
    }
}

#[cfg(test)]
#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> SyncResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        if self.rejecting.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SyncError::Storage("disk full".to_string()));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> SyncResult<()> {
        self.inner.remove(key).await
    }
}

/// Persists the whole queue as one JSON blob plus the last sync timestamp
#[derive(Clone)]
pub struct QueueStore {
    kv: Arc<dyn KeyValueStore>,
    queue_key: String,
    last_sync_key: String,
}

impl QueueStore {
    /// Creates a queue store using the default keys
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_keys(kv, DEFAULT_QUEUE_KEY, DEFAULT_LAST_SYNC_KEY)
    }

    /// Creates a queue store using custom keys
    pub fn with_keys(
        kv: Arc<dyn KeyValueStore>,
        queue_key: impl Into<String>,
        last_sync_key: impl Into<String>,
    ) -> Self {
        Self {
            kv,
            queue_key: queue_key.into(),
            last_sync_key: last_sync_key.into(),
        }
    }

    /// Loads the persisted queue
    ///
    /// Missing, unreadable, or corrupted data yields an empty queue; the
    /// failure is logged and the lost blob is left in place until the next
    /// save overwrites it.
    pub async fn load(&self) -> Vec<QueueItem> {
        let raw = match self.kv.get(&self.queue_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("Failed to read offline queue, starting empty: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<QueueItem>>(&raw) {
            Ok(items) => {
                log::debug!("Loaded {} queued mutations", items.len());
                items
            }
            Err(e) => {
                log::warn!(
                    "Offline queue under '{}' is corrupted, discarding it: {}",
                    self.queue_key,
                    e
                );
                Vec::new()
            }
        }
    }

    /// Overwrites the persisted queue with `items`
    pub async fn save(&self, items: &[QueueItem]) -> SyncResult<()> {
        let raw = serde_json::to_string(items)?;
        self.kv.set(&self.queue_key, &raw).await
    }

    /// Loads the last sync timestamp, if one was recorded and parses
    pub async fn load_last_sync(&self) -> Option<DateTime<Utc>> {
        let raw = match self.kv.get(&self.last_sync_key).await {
            Ok(raw) => raw?,
            Err(e) => {
                log::warn!("Failed to read last sync time: {}", e);
                return None;
            }
        };

        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(at) => Some(at.with_timezone(&Utc)),
            Err(e) => {
                log::warn!("Ignoring unparseable last sync time '{}': {}", raw, e);
                None
            }
        }
    }

    /// Records the last sync timestamp
    pub async fn save_last_sync(&self, at: DateTime<Utc>) -> SyncResult<()> {
        self.kv.set(&self.last_sync_key, &at.to_rfc3339()).await
    }

    /// Removes the persisted queue and timestamp
    pub async fn clear(&self) -> SyncResult<()> {
        self.kv.remove(&self.queue_key).await?;
        self.kv.remove(&self.last_sync_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;
    use serde_json::json;

    fn sample_items() -> Vec<QueueItem> {
        vec![
            QueueItem::new("orders", Action::Update, json!({"id": "42", "status": "cancelled"}))
                .unwrap(),
            QueueItem::new("wishlist", Action::Create, json!({"product_id": "p9"})).unwrap(),
            QueueItem::new("cart", Action::Delete, json!({"id": 7})).unwrap()
                .with_failed_attempt()
                .with_failed_attempt(),
        ]
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let store = QueueStore::new(Arc::new(MemoryStore::new()));
        assert!(store.load().await.is_empty());
        assert!(store.load_last_sync().await.is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let store = QueueStore::new(Arc::new(MemoryStore::new()));
        let items = sample_items();

        store.save(&items).await.unwrap();
        let loaded = store.load().await;

        assert_eq!(loaded, items);
        assert_eq!(loaded[2].attempts(), 2);
    }

    #[tokio::test]
    async fn test_corrupted_blob_yields_empty_queue() {
        let kv = Arc::new(MemoryStore::with_entry(DEFAULT_QUEUE_KEY, "[{\"id\": tru"));
        let store = QueueStore::new(kv);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_shape_yields_empty_queue() {
        let kv = Arc::new(MemoryStore::with_entry(DEFAULT_QUEUE_KEY, "{\"not\": \"a list\"}"));
        let store = QueueStore::new(kv);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_last_sync_roundtrip() {
        let store = QueueStore::new(Arc::new(MemoryStore::new()));
        let now = Utc::now();

        store.save_last_sync(now).await.unwrap();
        assert_eq!(store.load_last_sync().await, Some(now));
    }

    #[tokio::test]
    async fn test_custom_keys_and_clear() {
        let kv = Arc::new(MemoryStore::new());
        let store = QueueStore::with_keys(kv.clone(), "q", "t");

        store.save(&sample_items()).await.unwrap();
        store.save_last_sync(Utc::now()).await.unwrap();
        assert!(kv.peek("q").is_some());
        assert!(kv.peek("t").is_some());

        store.clear().await.unwrap();
        assert!(kv.peek("q").is_none());
        assert!(kv.peek("t").is_none());
    }
}
