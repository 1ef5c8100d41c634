use super::*;
use marketsync_sync_engine::{MemoryRemoteStore, MemoryStore, RemoteErrorKind, SkipReason};
use serde_json::json;
use tempfile::TempDir;

async fn setup_session(online: bool, auto_sync: bool) -> (Session, Arc<MemoryRemoteStore>) {
    let remote = Arc::new(MemoryRemoteStore::new());
    let monitor = Arc::new(NetworkMonitor::new(online));
    let coordinator = SyncCoordinator::new(
        one_shot(SyncConfig::default()),
        Arc::new(MemoryStore::new()),
        remote.clone(),
        monitor,
    )
    .await
    .unwrap();
    (Session::from_coordinator(coordinator, auto_sync), remote)
}

#[tokio::test]
async fn test_enqueue_offline_stays_queued() {
    let (session, remote) = setup_session(false, true).await;

    let item = enqueue(&session, "orders", "update", r#"{"id": "42", "status": "paid"}"#)
        .await
        .unwrap();

    assert_eq!(item.action(), Action::Update);
    assert_eq!(item.record_id().as_deref(), Some("42"));
    assert_eq!(session.coordinator().queue_size(), 1);
    assert_eq!(remote.call_count(), 0);
}

#[tokio::test]
async fn test_enqueue_online_syncs_immediately() {
    let (session, remote) = setup_session(true, true).await;

    enqueue(&session, "wishlist", "create", r#"{"product_id": "p1"}"#)
        .await
        .unwrap();

    assert_eq!(session.coordinator().queue_size(), 0);
    assert_eq!(remote.row_count("wishlist"), 1);
}

#[tokio::test]
async fn test_enqueue_online_without_auto_sync_waits() {
    let (session, remote) = setup_session(true, false).await;

    enqueue(&session, "cart", "delete", r#"{"id": 3}"#)
        .await
        .unwrap();

    assert_eq!(session.coordinator().queue_size(), 1);
    assert_eq!(remote.call_count(), 0);
}

#[tokio::test]
async fn test_enqueue_rejects_bad_input() {
    let (session, _remote) = setup_session(false, false).await;

    assert!(enqueue(&session, "orders", "upsert", "{}").await.is_err());
    assert!(enqueue(&session, "orders", "create", "not json").await.is_err());
    assert!(enqueue(&session, "orders", "create", "[1, 2]").await.is_err());
    assert!(enqueue(&session, "orders", "update", r#"{"status": "paid"}"#)
        .await
        .is_err());
    assert!(enqueue(&session, "", "create", "{}").await.is_err());

    assert_eq!(session.coordinator().queue_size(), 0);
}

#[tokio::test]
async fn test_sync_offline_is_skipped() {
    let (session, _remote) = setup_session(false, false).await;
    enqueue(&session, "orders", "create", r#"{"total": 10}"#)
        .await
        .unwrap();

    let outcome = sync(&session).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::Offline));
    assert_eq!(session.coordinator().queue_size(), 1);
}

#[tokio::test]
async fn test_sync_reports_failures() {
    let (session, remote) = setup_session(true, false).await;
    remote.fail_table("reviews", RemoteErrorKind::Server);

    enqueue(&session, "orders", "create", r#"{"total": 10}"#)
        .await
        .unwrap();
    enqueue(&session, "reviews", "create", r#"{"stars": 5}"#)
        .await
        .unwrap();

    let outcome = sync(&session).await.unwrap();
    let report = outcome.report().unwrap();
    assert_eq!(report.attempted, 2);
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.retried.len(), 1);

    let items = list(&session, false).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].target(), "reviews");
    assert_eq!(items[0].attempts(), 1);
}

#[tokio::test]
async fn test_status_reflects_queue() {
    let (session, _remote) = setup_session(true, false).await;

    let before = status(&session, true).unwrap();
    assert!(before.online);
    assert!(!before.has_pending_changes());
    assert!(before.last_sync.is_none());

    enqueue(&session, "orders", "create", r#"{"total": 10}"#)
        .await
        .unwrap();
    assert_eq!(status(&session, false).unwrap().queue_size, 1);

    sync(&session).await.unwrap();
    let after = status(&session, false).unwrap();
    assert_eq!(after.queue_size, 0);
    assert!(after.last_sync.is_some());
}

#[tokio::test]
async fn test_list_preserves_order() {
    let (session, _remote) = setup_session(false, false).await;

    for n in 1..=3 {
        enqueue(&session, "cart", "update", &json!({"id": n, "qty": n}).to_string())
            .await
            .unwrap();
    }

    let items = list(&session, true).await.unwrap();
    let ids: Vec<_> = items.iter().filter_map(|i| i.record_id()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_clear_force() {
    let (session, _remote) = setup_session(false, false).await;

    assert!(!clear(&session, true).await.unwrap());

    enqueue(&session, "orders", "create", r#"{"total": 10}"#)
        .await
        .unwrap();
    assert!(clear(&session, true).await.unwrap());
    assert_eq!(session.coordinator().queue_size(), 0);
}

#[tokio::test]
async fn test_session_survives_restart() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("data").join("queue.db");
    let config = Config::default();

    let session = Session::open(&config, &db_path, true).await.unwrap();
    enqueue(&session, "orders", "delete", r#"{"id": "o-1"}"#)
        .await
        .unwrap();
    assert!(!session.coordinator().is_online());
    session.close().await;

    let reopened = Session::open(&config, &db_path, true).await.unwrap();
    let items = reopened.coordinator().pending_items().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].record_id().as_deref(), Some("o-1"));
    reopened.close().await;
}

#[test]
fn test_config_commands() {
    let temp = TempDir::new().unwrap();
    let manager = ConfigManager::with_directory(temp.path().to_path_buf()).unwrap();

    config_init(&manager).unwrap();
    assert!(manager.config_path().exists());
    config_init(&manager).unwrap();

    let mut config = manager.load().unwrap();
    config.remote.api_key = "secret-anon-key".to_string();
    config_show(&config, &manager.database_path(&config)).unwrap();
    config_path(&manager).unwrap();
}

#[test]
fn test_format_age() {
    assert_eq!(format_age(chrono::Duration::seconds(5)), "just now");
    assert_eq!(format_age(chrono::Duration::seconds(-30)), "just now");
    assert_eq!(format_age(chrono::Duration::seconds(125)), "2m ago");
    assert_eq!(format_age(chrono::Duration::seconds(3_660)), "1h 1m ago");
    assert_eq!(format_age(chrono::Duration::seconds(3 * 86_400)), "3d ago");
}

#[test]
fn test_format_last_sync_never() {
    assert_eq!(format_last_sync(None, Utc::now()), "never");
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("12345678", 8), "12345678");
    assert_eq!(truncate("123456789", 8), "12345678...");
    assert_eq!(truncate("ééééééééé", 8), "éééééééé...");
}
