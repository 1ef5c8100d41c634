// crates/sync-engine/src/lib.rs
//! Offline mutation queue and sync engine
//!
//! This module records mutations made while the device is offline, persists
//! them durably, and replays them against the remote store once
//! connectivity returns:
//! - Durable queue storage over any key-value store
//! - Network monitor with transition listeners
//! - FIFO mutation queue with batch commits
//! - Sequential drain passes with a retry ceiling and per-call timeouts
//! - A coordinator facade that ties it together
//!
//! # Example
//!
//! ```rust
//! use marketsync_sync_engine::{
//!     Action, MemoryRemoteStore, MemoryStore, NetworkMonitor, SyncConfig, SyncCoordinator,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let monitor = Arc::new(NetworkMonitor::new(false));
//! let remote = Arc::new(MemoryRemoteStore::new());
//! let config = SyncConfig {
//!     auto_sync: false,
//!     ..Default::default()
//! };
//! let coordinator = SyncCoordinator::new(
//!     config,
//!     Arc::new(MemoryStore::new()),
//!     remote.clone(),
//!     monitor.clone(),
//! )
//! .await?;
//!
//! // Queued while offline
//! coordinator
//!     .enqueue(
//!         "orders",
//!         Action::Update,
//!         serde_json::json!({"id": "42", "status": "cancelled"}),
//!     )
//!     .await?;
//! assert_eq!(coordinator.queue_size(), 1);
//!
//! // Replayed once back online
//! monitor.set_connected(true);
//! coordinator.sync_all().await?;
//! assert_eq!(coordinator.queue_size(), 0);
//! # Ok(())
//! # }
//! ```

mod coordinator;
mod engine;
mod error;
mod listeners;
mod monitor;
mod queue;
mod remote;
mod store;
mod types;

pub use coordinator::SyncCoordinator;
pub use engine::{SyncConfig, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use listeners::{ListenerRegistry, Subscription};
pub use monitor::NetworkMonitor;
pub use queue::MutationQueue;
pub use remote::{
    MemoryRemoteStore, RemoteCall, RemoteError, RemoteErrorKind, RemoteResult, RemoteStore,
};
pub use store::{KeyValueStore, MemoryStore, QueueStore, DEFAULT_LAST_SYNC_KEY, DEFAULT_QUEUE_KEY};
pub use types::{
    Action, DrainReport, ItemId, QueueItem, SkipReason, SyncOutcome, SyncStatus, RECORD_ID_FIELD,
};

/// Re-exported so implementors of [`RemoteStore`] and [`KeyValueStore`]
/// use the same macro version
pub use async_trait::async_trait;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        // Verify all types are exported
        let _: SyncConfig = SyncConfig::default();
        let _: NetworkMonitor = NetworkMonitor::new(true);
        let _: MemoryStore = MemoryStore::new();
        let _: MemoryRemoteStore = MemoryRemoteStore::new();
        let _: ItemId = ItemId::generate();
    }
}
