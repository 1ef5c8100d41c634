// crates/sync-engine/src/queue.rs
//! In-memory mutation queue backed by the durable store

use crate::error::SyncResult;
use crate::store::QueueStore;
use crate::types::{Action, ItemId, QueueItem};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// FIFO of pending mutations
///
/// The queue is the only writer of its [`QueueStore`]. Enqueues and clears
/// are staged, persisted, and only then made visible; if the write fails the
/// in-memory queue is left as it was and the error is returned. Drain
/// results are the exception, see [`MutationQueue::commit_pass`].
pub struct MutationQueue {
    items: Mutex<Vec<QueueItem>>,
    len: AtomicUsize,
    store: QueueStore,
}

impl MutationQueue {
    /// Loads the persisted queue from `store`
    pub async fn load(store: QueueStore) -> Self {
        let items = store.load().await;
        if !items.is_empty() {
            log::info!("Restored {} pending mutations", items.len());
        }
        Self {
            len: AtomicUsize::new(items.len()),
            items: Mutex::new(items),
            store,
        }
    }

    /// Appends a new mutation and persists the queue
    pub async fn enqueue(
        &self,
        target: impl Into<String>,
        action: Action,
        payload: Value,
    ) -> SyncResult<QueueItem> {
        let item = QueueItem::new(target, action, payload)?;

        let mut items = self.items.lock().await;
        let mut next = items.clone();
        next.push(item.clone());
        self.commit(&mut items, next).await?;

        log::debug!(
            "Queued {} on '{}' as {} ({} pending)",
            item.action(),
            item.target(),
            item.id(),
            items.len()
        );
        Ok(item)
    }

    /// Removes the items whose id is in `ids` and persists the queue
    ///
    /// Returns the number of items removed.
    pub async fn remove(&self, ids: &HashSet<ItemId>) -> SyncResult<usize> {
        let mut items = self.items.lock().await;
        let next: Vec<QueueItem> = items
            .iter()
            .filter(|item| !ids.contains(item.id()))
            .cloned()
            .collect();

        let removed = items.len() - next.len();
        if removed > 0 {
            self.commit(&mut items, next).await?;
        }
        Ok(removed)
    }

    /// Applies the results of a drain pass with a single write
    ///
    /// Items in `removed` leave the queue; items in `failed` get one more
    /// attempt counted. Items enqueued since the pass took its snapshot are
    /// untouched.
    ///
    /// Unlike the other mutators, the new state is installed even when the
    /// write fails: the remote store has already seen these results. The
    /// error is still returned and the next successful write persists the
    /// state.
    pub async fn commit_pass(
        &self,
        removed: &HashSet<ItemId>,
        failed: &HashSet<ItemId>,
    ) -> SyncResult<()> {
        if removed.is_empty() && failed.is_empty() {
            return Ok(());
        }

        let mut items = self.items.lock().await;
        let next: Vec<QueueItem> = items
            .iter()
            .filter(|item| !removed.contains(item.id()))
            .map(|item| {
                if failed.contains(item.id()) {
                    item.with_failed_attempt()
                } else {
                    item.clone()
                }
            })
            .collect();

        let saved = self.store.save(&next).await;
        self.len.store(next.len(), Ordering::SeqCst);
        *items = next;
        saved
    }

    /// Snapshot of every pending item in FIFO order
    pub async fn all(&self) -> Vec<QueueItem> {
        self.items.lock().await.clone()
    }

    /// Number of pending items
    pub fn size(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    /// Returns true if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Drops every pending item and persists the empty queue
    pub async fn clear(&self) -> SyncResult<()> {
        let mut items = self.items.lock().await;
        self.commit(&mut items, Vec::new()).await
    }

    /// Persists `next`, then installs it as the live queue
    async fn commit(&self, items: &mut Vec<QueueItem>, next: Vec<QueueItem>) -> SyncResult<()> {
        self.store.save(&next).await?;
        self.len.store(next.len(), Ordering::SeqCst);
        *items = next;
        Ok(())
    }
}
