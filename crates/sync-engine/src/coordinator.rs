// crates/sync-engine/src/coordinator.rs
//! Public facade over the queue, engine, and network monitor

use crate::engine::{SyncConfig, SyncEngine};
use crate::error::{SyncError, SyncResult};
use crate::listeners::{ListenerRegistry, Subscription};
use crate::monitor::NetworkMonitor;
use crate::queue::MutationQueue;
use crate::remote::RemoteStore;
use crate::store::{KeyValueStore, QueueStore};
use crate::types::{Action, QueueItem, SyncOutcome, SyncStatus};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;

struct Inner {
    config: SyncConfig,
    queue: Arc<MutationQueue>,
    engine: SyncEngine,
    online: AtomicBool,
    listeners: ListenerRegistry<bool>,
    runtime: Handle,
    // Held for its Drop: unsubscribes from the monitor with the last handle.
    _monitor_subscription: Subscription,
}

/// Entry point for the rest of the application
///
/// Construct one per process at startup and pass clones around; all clones
/// share the same queue, engine, and state.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    /// Loads the persisted queue and starts following `monitor`
    ///
    /// Must be called from within a Tokio runtime; background syncs are
    /// spawned onto it.
    pub async fn new(
        config: SyncConfig,
        kv: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteStore>,
        monitor: Arc<NetworkMonitor>,
    ) -> SyncResult<Self> {
        let runtime = Handle::try_current().map_err(|e| SyncError::Runtime(e.to_string()))?;

        let store = QueueStore::with_keys(kv, &config.queue_key, &config.last_sync_key);
        let queue = Arc::new(MutationQueue::load(store.clone()).await);
        let last_sync = store.load_last_sync().await;
        let engine = SyncEngine::new(queue.clone(), store, remote, &config, last_sync);

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let weak = weak.clone();
            let subscription = monitor.subscribe(move |connected| {
                if let Some(inner) = weak.upgrade() {
                    SyncCoordinator { inner }.on_network_change(connected);
                }
            });

            Inner {
                online: AtomicBool::new(monitor.is_connected()),
                config,
                queue,
                engine,
                listeners: ListenerRegistry::new(),
                runtime,
                _monitor_subscription: subscription,
            }
        });

        let coordinator = Self { inner };
        log::info!(
            "Sync coordinator ready: {} pending, network {}",
            coordinator.queue_size(),
            if coordinator.is_online() { "online" } else { "offline" }
        );

        if coordinator.should_auto_sync() && coordinator.queue_size() > 0 {
            coordinator.spawn_sync("startup");
        }

        Ok(coordinator)
    }

    /// Queues a mutation and, when online, kicks off a background sync
    ///
    /// Sync failures are never reported to the caller; watch
    /// [`SyncCoordinator::queue_size`] instead. If a pass is already running
    /// the background sync is skipped and the item waits for the next
    /// trigger; call [`SyncCoordinator::sync_all`] to send it sooner.
    pub async fn enqueue(
        &self,
        target: impl Into<String>,
        action: Action,
        payload: Value,
    ) -> SyncResult<QueueItem> {
        let item = self.inner.queue.enqueue(target, action, payload).await?;
        if self.should_auto_sync() {
            self.spawn_sync("enqueue");
        }
        Ok(item)
    }

    /// Runs one drain pass now
    ///
    /// Concurrent calls collapse: while a pass is running, further calls
    /// return `Skipped(AlreadySyncing)` instead of queueing another pass.
    pub async fn sync_all(&self) -> SyncResult<SyncOutcome> {
        self.inner.engine.drain(self.is_online()).await
    }

    /// Registers an application listener for online/offline transitions
    pub fn subscribe_online_status<F>(&self, listener: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .subscribe(move |online: &bool| listener(*online))
    }

    /// Number of queued mutations
    pub fn queue_size(&self) -> usize {
        self.inner.queue.size()
    }

    /// Last known connectivity
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Returns true while a drain pass is running
    pub fn is_syncing(&self) -> bool {
        self.inner.engine.is_syncing()
    }

    /// When the last drain pass finished
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.inner.engine.last_sync()
    }

    /// Snapshot of the queued mutations in FIFO order
    pub async fn pending_items(&self) -> Vec<QueueItem> {
        self.inner.queue.all().await
    }

    /// Snapshot of coordinator state
    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            online: self.is_online(),
            syncing: self.is_syncing(),
            queue_size: self.queue_size(),
            last_sync: self.last_sync_time(),
        }
    }

    /// Discards every queued mutation and the last sync time
    ///
    /// Safe to call while a sync is running; that pass finishes without
    /// recording a sync time.
    pub async fn clear_all(&self) -> SyncResult<()> {
        self.inner.engine.clear().await?;
        log::info!("Cleared offline queue");
        Ok(())
    }

    /// The configuration this coordinator runs with
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    fn should_auto_sync(&self) -> bool {
        self.inner.config.auto_sync && self.is_online()
    }

    fn on_network_change(&self, connected: bool) {
        let was_online = self.inner.online.swap(connected, Ordering::SeqCst);
        if was_online == connected {
            return;
        }

        self.inner.listeners.notify(&connected);

        if connected && self.inner.config.auto_sync {
            self.spawn_sync("network restored");
        }
    }

    /// Fire-and-forget sync on the coordinator's runtime
    fn spawn_sync(&self, reason: &'static str) {
        let coordinator = self.clone();
        self.inner.runtime.spawn(async move {
            match coordinator.sync_all().await {
                Ok(SyncOutcome::Completed(report)) => log::debug!(
                    "Background sync ({}) finished with {} item(s) left",
                    reason,
                    report.retried.len()
                ),
                Ok(SyncOutcome::Skipped(why)) => {
                    log::debug!("Background sync ({}) skipped: {}", reason, why)
                }
                Err(e) => log::warn!("Background sync ({}) failed: {}", reason, e),
            }
        });
    }
}
