// crates/sync-engine/src/engine.rs
//! Drain pass: replays queued mutations against the remote store

use crate::error::SyncResult;
use crate::queue::MutationQueue;
use crate::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::store::{QueueStore, DEFAULT_LAST_SYNC_KEY, DEFAULT_QUEUE_KEY};
use crate::types::{Action, DrainReport, ItemId, QueueItem, SkipReason, SyncOutcome};
use chrono::{DateTime, Utc};
use marketsync_resilience::{RetryPolicy, Timeout};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

/// Configuration for the sync engine
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Failed attempts after which an item is dropped
    pub max_attempts: u32,
    /// Upper bound on each remote store call
    pub call_timeout: Duration,
    /// Whether enqueues and reconnects trigger a sync automatically
    pub auto_sync: bool,
    /// Drop items on permanent remote errors instead of retrying them
    pub drop_permanent_errors: bool,
    /// Storage key for the serialized queue
    pub queue_key: String,
    /// Storage key for the last sync timestamp
    pub last_sync_key: String,
}

impl SyncConfig {
    /// Retry policy derived from this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts).with_error_classification(self.drop_permanent_errors)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            call_timeout: Duration::from_secs(30),
            auto_sync: true,
            drop_permanent_errors: false,
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            last_sync_key: DEFAULT_LAST_SYNC_KEY.to_string(),
        }
    }
}

/// Clears the in-progress flag on every exit path, including panics and
/// cancellation of the drain future.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Replays the mutation queue against a remote store
pub struct SyncEngine {
    queue: Arc<MutationQueue>,
    store: QueueStore,
    remote: Arc<dyn RemoteStore>,
    policy: RetryPolicy,
    timeout: Timeout,
    syncing: AtomicBool,
    last_sync: Mutex<Option<DateTime<Utc>>>,
    // Bumped by every clear; a pass started under an older value does not
    // record its sync time.
    generation: AtomicU64,
    // Serializes recording pass results against clears.
    record: AsyncMutex<()>,
}

impl SyncEngine {
    /// Creates a new sync engine
    pub fn new(
        queue: Arc<MutationQueue>,
        store: QueueStore,
        remote: Arc<dyn RemoteStore>,
        config: &SyncConfig,
        last_sync: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            queue,
            store,
            remote,
            policy: config.retry_policy(),
            timeout: Timeout::new(config.call_timeout),
            syncing: AtomicBool::new(false),
            last_sync: Mutex::new(last_sync),
            generation: AtomicU64::new(0),
            record: AsyncMutex::new(()),
        }
    }

    /// Returns true while a drain pass is running
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// When the last drain pass finished
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self
            .last_sync
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Discards the queue, the persisted state and the last sync time
    ///
    /// Waits for a running pass to finish recording its results. A pass
    /// still talking to the remote store when this returns will not bring
    /// the sync time back.
    pub async fn clear(&self) -> SyncResult<()> {
        let _record = self.record.lock().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.queue.clear().await?;
        self.store.clear().await?;
        self.set_last_sync(None);
        Ok(())
    }

    fn set_last_sync(&self, at: Option<DateTime<Utc>>) {
        *self
            .last_sync
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = at;
    }

    /// Runs one drain pass
    ///
    /// Returns immediately without touching the remote store if another
    /// pass is running, `online` is false, or the queue is empty. Otherwise
    /// every queued item is applied once, in FIFO order, one at a time.
    /// Item failures never abort the pass. A failed write of the pass
    /// results is logged; the in-memory queue still reflects the pass and
    /// the next write persists it.
    pub async fn drain(&self, online: bool) -> SyncResult<SyncOutcome> {
        let Some(_guard) = DrainGuard::acquire(&self.syncing) else {
            log::debug!("Sync skipped: {}", SkipReason::AlreadySyncing);
            return Ok(SyncOutcome::Skipped(SkipReason::AlreadySyncing));
        };
        if !online {
            log::debug!("Sync skipped: {}", SkipReason::Offline);
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }

        let generation = self.generation.load(Ordering::Acquire);
        let snapshot = self.queue.all().await;
        if snapshot.is_empty() {
            return Ok(SyncOutcome::Skipped(SkipReason::EmptyQueue));
        }

        log::info!("Syncing {} queued mutations", snapshot.len());

        let mut removed: HashSet<ItemId> = HashSet::new();
        let mut failed: HashSet<ItemId> = HashSet::new();
        let mut succeeded = Vec::new();
        let mut retried = Vec::new();
        let mut dropped = Vec::new();

        for item in &snapshot {
            match self.apply(item).await {
                Ok(()) => {
                    log::debug!("Synced {} on '{}' ({})", item.action(), item.target(), item.id());
                    removed.insert(item.id().clone());
                    succeeded.push(item.id().clone());
                }
                Err(err) => {
                    let attempts = item.attempts().saturating_add(1);
                    if self.policy.should_give_up(attempts, &err) {
                        log::warn!(
                            "Dropping {} on '{}' ({}) after {} failed attempt(s): {}",
                            item.action(),
                            item.target(),
                            item.id(),
                            attempts,
                            err
                        );
                        removed.insert(item.id().clone());
                        dropped.push(item.id().clone());
                    } else {
                        log::debug!(
                            "Sync of {} failed (attempt {}/{}): {}",
                            item.id(),
                            attempts,
                            self.policy.max_attempts(),
                            err
                        );
                        failed.insert(item.id().clone());
                        retried.push(item.id().clone());
                    }
                }
            }
        }

        let finished_at = Utc::now();
        {
            let _record = self.record.lock().await;
            if let Err(e) = self.queue.commit_pass(&removed, &failed).await {
                log::warn!("Failed to persist sync results, keeping them in memory: {}", e);
            }

            if self.generation.load(Ordering::Acquire) == generation {
                self.set_last_sync(Some(finished_at));
                if let Err(e) = self.store.save_last_sync(finished_at).await {
                    log::warn!("Failed to persist last sync time: {}", e);
                }
            } else {
                log::debug!("Queue was cleared during the pass, not recording sync time");
            }
        }

        let report = DrainReport {
            attempted: snapshot.len(),
            succeeded,
            retried,
            dropped,
            finished_at,
        };
        log::info!(
            "Sync pass finished: {} synced, {} pending retry, {} dropped",
            report.succeeded.len(),
            report.retried.len(),
            report.dropped.len()
        );

        Ok(SyncOutcome::Completed(report))
    }

    /// Dispatches one item to the remote store under the call timeout
    async fn apply(&self, item: &QueueItem) -> RemoteResult<()> {
        match self.timeout.execute(self.dispatch(item)).await {
            Ok(result) => result,
            Err(elapsed) => Err(RemoteError::from(elapsed)),
        }
    }

    async fn dispatch(&self, item: &QueueItem) -> RemoteResult<()> {
        let table = item.target();
        match item.action() {
            Action::Create => self.remote.insert(table, item.payload()).await.map(|_| ()),
            Action::Update => {
                let id = Self::record_id(item)?;
                self.remote.update_by_id(table, &id, &item.patch()).await
            }
            Action::Delete => {
                let id = Self::record_id(item)?;
                self.remote.delete_by_id(table, &id).await
            }
        }
    }

    fn record_id(item: &QueueItem) -> RemoteResult<String> {
        item.record_id().ok_or_else(|| {
            RemoteError::validation(format!("{} payload has no record id", item.action()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemoteStore, RemoteCall, RemoteErrorKind};
    use crate::store::{FlakyStore, MemoryStore};
    use serde_json::json;

    struct Harness {
        queue: Arc<MutationQueue>,
        remote: Arc<MemoryRemoteStore>,
        store: QueueStore,
        engine: SyncEngine,
    }

    async fn harness(config: SyncConfig) -> Harness {
        let store = QueueStore::new(Arc::new(MemoryStore::new()));
        let queue = Arc::new(MutationQueue::load(store.clone()).await);
        let remote = Arc::new(MemoryRemoteStore::new());
        let engine = SyncEngine::new(queue.clone(), store.clone(), remote.clone(), &config, None);
        Harness {
            queue,
            remote,
            store,
            engine,
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert!(config.auto_sync);
        assert!(!config.retry_policy().classifies_errors());
    }

    #[tokio::test]
    async fn test_offline_is_noop() {
        let h = harness(SyncConfig::default()).await;
        h.queue.enqueue("t", Action::Create, json!({})).await.unwrap();

        let outcome = h.engine.drain(false).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::Offline));
        assert_eq!(h.remote.call_count(), 0);
        assert_eq!(h.queue.size(), 1);
        assert!(!h.engine.is_syncing());
    }

    #[tokio::test]
    async fn test_empty_queue_is_noop() {
        let h = harness(SyncConfig::default()).await;
        let outcome = h.engine.drain(true).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::EmptyQueue));
        assert!(h.engine.last_sync().is_none());
    }

    #[tokio::test]
    async fn test_dispatch_by_action() {
        let h = harness(SyncConfig::default()).await;
        h.queue
            .enqueue("orders", Action::Create, json!({"id": "42", "status": "open"}))
            .await
            .unwrap();
        h.queue
            .enqueue("orders", Action::Update, json!({"id": "42", "status": "cancelled"}))
            .await
            .unwrap();
        h.queue
            .enqueue("orders", Action::Delete, json!({"id": "42"}))
            .await
            .unwrap();

        let outcome = h.engine.drain(true).await.unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.attempted, 3);
        assert!(report.is_clean());

        assert_eq!(
            h.remote.calls(),
            vec![
                RemoteCall::Insert {
                    table: "orders".to_string(),
                    record: json!({"id": "42", "status": "open"}),
                },
                RemoteCall::Update {
                    table: "orders".to_string(),
                    id: "42".to_string(),
                    patch: json!({"status": "cancelled"}),
                },
                RemoteCall::Delete {
                    table: "orders".to_string(),
                    id: "42".to_string(),
                },
            ]
        );
        assert!(h.queue.is_empty());
        assert!(h.engine.last_sync().is_some());
        assert!(h.store.load_last_sync().await.is_some());
    }

    #[tokio::test]
    async fn test_failure_keeps_item_and_counts_attempt() {
        let h = harness(SyncConfig::default()).await;
        h.queue.enqueue("orders", Action::Delete, json!({"id": "1"})).await.unwrap();
        h.remote.fail_all(Some(RemoteErrorKind::Server));

        let outcome = h.engine.drain(true).await.unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.retried.len(), 1);
        assert!(report.dropped.is_empty());

        let items = h.queue.all().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].attempts(), 1);
        // The pass still counts as a sync.
        assert!(h.engine.last_sync().is_some());
    }

    #[tokio::test]
    async fn test_poison_item_does_not_block_others() {
        let h = harness(SyncConfig::default()).await;
        h.remote.fail_table("reviews", RemoteErrorKind::Validation);
        h.queue.enqueue("reviews", Action::Create, json!({"stars": 9})).await.unwrap();
        h.queue.enqueue("wishlist", Action::Create, json!({"p": 1})).await.unwrap();

        let outcome = h.engine.drain(true).await.unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.retried.len(), 1);
        assert_eq!(h.queue.size(), 1);
        assert_eq!(h.queue.all().await[0].target(), "reviews");
    }

    #[tokio::test]
    async fn test_permanent_errors_dropped_when_classifying() {
        let config = SyncConfig {
            drop_permanent_errors: true,
            ..Default::default()
        };
        let h = harness(config).await;
        h.remote.fail_table("reviews", RemoteErrorKind::Validation);
        h.remote.fail_table("cart", RemoteErrorKind::Network);
        h.queue.enqueue("reviews", Action::Create, json!({})).await.unwrap();
        h.queue.enqueue("cart", Action::Create, json!({})).await.unwrap();

        let outcome = h.engine.drain(true).await.unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.retried.len(), 1);
        assert_eq!(h.queue.all().await[0].target(), "cart");
    }

    #[tokio::test]
    async fn test_unsaved_results_are_not_sent_twice() {
        let kv = Arc::new(FlakyStore::default());
        let store = QueueStore::new(kv.clone());
        let queue = Arc::new(MutationQueue::load(store.clone()).await);
        let remote = Arc::new(MemoryRemoteStore::new());
        let engine = SyncEngine::new(
            queue.clone(),
            store,
            remote.clone(),
            &SyncConfig::default(),
            None,
        );
        queue
            .enqueue("wishlist", Action::Create, json!({"product_id": "p1"}))
            .await
            .unwrap();

        kv.reject_writes(true);
        let outcome = engine.drain(true).await.unwrap();
        assert_eq!(outcome.report().unwrap().succeeded.len(), 1);
        assert!(queue.is_empty());
        assert!(engine.last_sync().is_some());
        assert!(kv.peek(DEFAULT_LAST_SYNC_KEY).is_none());

        kv.reject_writes(false);
        let second = engine.drain(true).await.unwrap();
        assert_eq!(second, SyncOutcome::Skipped(SkipReason::EmptyQueue));
        assert_eq!(remote.call_count(), 1);
        assert_eq!(remote.row_count("wishlist"), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_table_heals() {
        let h = harness(SyncConfig::default()).await;
        h.remote.fail_table("reviews", RemoteErrorKind::Server);
        h.queue.enqueue("reviews", Action::Create, json!({"stars": 4})).await.unwrap();

        h.engine.drain(true).await.unwrap();
        h.engine.drain(true).await.unwrap();
        assert_eq!(h.queue.all().await[0].attempts(), 2);

        h.remote.heal_tables();
        let outcome = h.engine.drain(true).await.unwrap();
        assert_eq!(outcome.report().unwrap().succeeded.len(), 1);
        assert!(h.queue.is_empty());
        assert_eq!(h.remote.row_count("reviews"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_during_pass_keeps_sync_time_cleared() {
        let kv = Arc::new(MemoryStore::new());
        let store = QueueStore::new(kv.clone());
        let queue = Arc::new(MutationQueue::load(store.clone()).await);
        let remote = Arc::new(MemoryRemoteStore::new());
        let engine = Arc::new(SyncEngine::new(
            queue.clone(),
            store,
            remote.clone(),
            &SyncConfig::default(),
            Some(Utc::now()),
        ));
        remote.set_latency(Some(Duration::from_millis(200)));
        queue.enqueue("cart", Action::Delete, json!({"id": "c1"})).await.unwrap();

        let pass = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.drain(true).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(engine.is_syncing());

        engine.clear().await.unwrap();
        assert!(engine.last_sync().is_none());

        let outcome = pass.await.unwrap().unwrap();
        assert!(!outcome.is_skipped());
        assert!(engine.last_sync().is_none());
        assert!(kv.peek(DEFAULT_LAST_SYNC_KEY).is_none());
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_call_times_out() {
        let config = SyncConfig {
            call_timeout: Duration::from_secs(30),
            ..Default::default()
        };
        let h = harness(config).await;
        h.remote.set_latency(Some(Duration::from_secs(3600)));
        h.queue.enqueue("orders", Action::Delete, json!({"id": "1"})).await.unwrap();

        let outcome = h.engine.drain(true).await.unwrap();
        assert_eq!(outcome.report().unwrap().retried.len(), 1);
        assert_eq!(h.queue.all().await[0].attempts(), 1);
    }

    #[tokio::test]
    async fn test_guard_released_after_pass() {
        let h = harness(SyncConfig::default()).await;
        h.queue.enqueue("t", Action::Create, json!({})).await.unwrap();
        h.engine.drain(true).await.unwrap();
        assert!(!h.engine.is_syncing());

        h.queue.enqueue("t", Action::Create, json!({})).await.unwrap();
        let outcome = h.engine.drain(true).await.unwrap();
        assert!(!outcome.is_skipped());
    }

    #[test]
    fn test_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let guard = DrainGuard::acquire(&flag);
        assert!(guard.is_some());
        assert!(DrainGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(DrainGuard::acquire(&flag).is_some());
    }
}
