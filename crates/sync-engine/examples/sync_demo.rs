// crates/sync-engine/examples/sync_demo.rs
//! Demonstration of the offline sync engine

use marketsync_sync_engine::{
    Action, MemoryRemoteStore, MemoryStore, NetworkMonitor, RemoteErrorKind, SyncConfig,
    SyncCoordinator,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    println!("MarketSync Sync Engine Demo");
    println!("===========================\n");

    demo_offline_queue().await;
    println!();
    demo_retry_ceiling().await;
}

fn manual_config() -> SyncConfig {
    SyncConfig {
        auto_sync: false,
        ..Default::default()
    }
}

async fn demo_offline_queue() {
    println!("1. Offline Queue and Replay");
    println!("---------------------------");

    let monitor = Arc::new(NetworkMonitor::new(false));
    let remote = Arc::new(MemoryRemoteStore::new());
    let coordinator = SyncCoordinator::new(
        manual_config(),
        Arc::new(MemoryStore::new()),
        remote.clone(),
        monitor.clone(),
    )
    .await
    .unwrap();

    let _status = coordinator.subscribe_online_status(|online| {
        println!("  → network {}", if online { "online" } else { "offline" });
    });

    println!("Recording changes while offline:");
    coordinator
        .enqueue(
            "orders",
            Action::Update,
            json!({"id": "42", "status": "cancelled"}),
        )
        .await
        .unwrap();
    println!("  ✓ Cancelled order 42");

    coordinator
        .enqueue("wishlist", Action::Create, json!({"product_id": "sku-17"}))
        .await
        .unwrap();
    println!("  ✓ Added sku-17 to wishlist");

    println!("\nPending changes: {}", coordinator.queue_size());
    println!("Sync while offline: {:?}", coordinator.sync_all().await.unwrap());

    monitor.set_connected(true);
    let outcome = coordinator.sync_all().await.unwrap();
    if let Some(report) = outcome.report() {
        println!(
            "Synced {} of {} changes",
            report.succeeded.len(),
            report.attempted
        );
    }
    println!("Pending changes after sync: {}", coordinator.queue_size());
    println!("Remote calls: {:?}", remote.calls());
}

async fn demo_retry_ceiling() {
    println!("2. Retry Ceiling");
    println!("----------------");

    let remote = Arc::new(MemoryRemoteStore::new());
    remote.fail_table("reviews", RemoteErrorKind::Server);

    let coordinator = SyncCoordinator::new(
        manual_config(),
        Arc::new(MemoryStore::new()),
        remote.clone(),
        Arc::new(NetworkMonitor::new(true)),
    )
    .await
    .unwrap();

    coordinator
        .enqueue("reviews", Action::Create, json!({"stars": 4}))
        .await
        .unwrap();

    let ceiling = coordinator.config().max_attempts;
    for pass in 1..=ceiling {
        coordinator.sync_all().await.unwrap();
        println!(
            "  Pass {}: {} pending",
            pass,
            coordinator.queue_size()
        );
    }

    println!(
        "\nItem dropped after {} failed attempts ({} remote calls)",
        ceiling,
        remote.call_count()
    );
}
