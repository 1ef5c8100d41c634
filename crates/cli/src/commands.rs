// FILE: crates/cli/src/commands.rs

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use console::style;
use marketsync_config::{Config, ConfigManager};
use marketsync_network::{
    Client, ClientConfig, ConnectivityChecker, ConnectivityProbe, RestConfig, RestRemoteStore,
};
use marketsync_storage::{DatabaseConfig, SqliteKvStore};
use marketsync_sync_engine::{
    Action, DrainReport, NetworkMonitor, QueueItem, SyncConfig, SyncCoordinator, SyncOutcome,
    SyncStatus,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Everything one command invocation needs
///
/// The process exits after each command, so background syncs are turned
/// off and the commands drain explicitly instead.
pub struct Session {
    coordinator: SyncCoordinator,
    kv: Option<Arc<SqliteKvStore>>,
    auto_sync: bool,
}

impl Session {
    /// Opens the queue database, builds the REST store and probes connectivity
    pub async fn open(config: &Config, db_path: &Path, offline: bool) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let kv = Arc::new(
            SqliteKvStore::open(DatabaseConfig::new(db_path.to_string_lossy()))
                .await
                .context("Failed to open queue database")?,
        );

        let client =
            Client::with_config(ClientConfig::default().with_timeout(config.remote.request_timeout()))
                .context("Failed to build HTTP client")?;
        let rest = RestConfig::new(&config.remote.base_url).with_api_key(&config.remote.api_key);
        let remote = RestRemoteStore::new(client.clone(), rest).context("Invalid remote URL")?;

        let monitor = Arc::new(NetworkMonitor::new(false));
        let coordinator = SyncCoordinator::new(
            one_shot(config.sync.to_sync_config()),
            kv.clone(),
            Arc::new(remote),
            monitor.clone(),
        )
        .await
        .context("Failed to load offline queue")?;

        if offline {
            log::info!("Offline mode, skipping connectivity probe");
        } else {
            let checker = ConnectivityChecker::with_urls(client, config.network.probe_urls.clone());
            ConnectivityProbe::new(checker, monitor)
                .with_interval(config.network.probe_interval())
                .check_once()
                .await;
        }

        Ok(Self {
            coordinator,
            kv: Some(kv),
            auto_sync: config.sync.auto_sync,
        })
    }

    /// Wraps an existing coordinator
    #[cfg(test)]
    pub fn from_coordinator(coordinator: SyncCoordinator, auto_sync: bool) -> Self {
        Self {
            coordinator,
            kv: None,
            auto_sync,
        }
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// Closes the database pool
    pub async fn close(self) {
        let Self { coordinator, kv, .. } = self;
        drop(coordinator);
        if let Some(kv) = kv.and_then(|kv| Arc::try_unwrap(kv).ok()) {
            kv.close().await;
        }
    }
}

fn one_shot(config: SyncConfig) -> SyncConfig {
    SyncConfig {
        auto_sync: false,
        ..config
    }
}

/// Queue a mutation, then drain right away when online and auto sync is on
pub async fn enqueue(
    session: &Session,
    table: &str,
    action: &str,
    payload: &str,
) -> Result<QueueItem> {
    let action: Action = action.parse().context("Invalid action")?;
    let payload: Value = serde_json::from_str(payload).context("Payload is not valid JSON")?;
    if !payload.is_object() {
        bail!("Payload must be a JSON object");
    }

    let coordinator = session.coordinator();
    let item = coordinator
        .enqueue(table, action, payload)
        .await
        .context("Failed to queue mutation")?;

    println!(
        "{} Queued {} on {}",
        style("✓").green().bold(),
        item.action(),
        style(item.target()).bold()
    );
    println!("  ID: {}", item.id());
    if let Some(record_id) = item.record_id() {
        println!("  Record: {}", record_id);
    }

    if session.auto_sync && coordinator.is_online() {
        let outcome = coordinator.sync_all().await.context("Sync failed")?;
        print_outcome(&outcome);
    } else {
        println!(
            "  {} pending; run 'marketsync sync' when back online",
            coordinator.queue_size()
        );
    }

    Ok(item)
}

/// Run one drain pass
pub async fn sync(session: &Session) -> Result<SyncOutcome> {
    let outcome = session
        .coordinator()
        .sync_all()
        .await
        .context("Sync failed")?;
    print_outcome(&outcome);
    Ok(outcome)
}

/// Show coordinator state
pub fn status(session: &Session, json: bool) -> Result<SyncStatus> {
    let status = session.coordinator().status();

    if json {
        let out = serde_json::to_string_pretty(&status).context("Failed to serialize status")?;
        println!("{}", out);
        return Ok(status);
    }

    println!("\n{}", style("Sync Status").bold().cyan());
    println!("{}", "=".repeat(40));
    let network = if status.online {
        style("online").green()
    } else {
        style("offline").red()
    };
    println!("Network: {}", network);
    println!("Pending: {}", style(status.queue_size).bold());
    println!("Last sync: {}", format_last_sync(status.last_sync, Utc::now()));

    Ok(status)
}

/// List queued mutations in replay order
pub async fn list(session: &Session, json: bool) -> Result<Vec<QueueItem>> {
    let items = session.coordinator().pending_items().await;

    if json {
        let out = serde_json::to_string_pretty(&items).context("Failed to serialize queue")?;
        println!("{}", out);
        return Ok(items);
    }

    if items.is_empty() {
        println!("Queue is empty. Nothing waiting to sync.");
        return Ok(items);
    }

    println!("\n{} Pending Mutations", style(items.len()).bold().cyan());
    println!("{}", "=".repeat(80));

    let max_attempts = session.coordinator().config().max_attempts;
    let now = Utc::now();
    for item in &items {
        print_item_summary(item, max_attempts, now);
    }

    Ok(items)
}

/// Discard the queue, asking first unless forced
///
/// Returns true if the queue was cleared.
pub async fn clear(session: &Session, force: bool) -> Result<bool> {
    let coordinator = session.coordinator();
    let pending = coordinator.queue_size();

    if pending == 0 {
        println!("Queue is already empty.");
        return Ok(false);
    }

    if !force {
        println!(
            "Discard {} pending change(s)? They will never reach the server. (y/N)",
            pending
        );
        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .context("Failed to read input")?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Clear cancelled.");
            return Ok(false);
        }
    }

    coordinator
        .clear_all()
        .await
        .context("Failed to clear queue")?;
    println!("{} Discarded {} change(s)", style("✓").green().bold(), pending);

    Ok(true)
}

pub fn config_init(manager: &ConfigManager) -> Result<()> {
    let created = manager
        .initialize()
        .context("Failed to write config file")?;

    if created {
        println!(
            "{} Wrote default config to {}",
            style("✓").green().bold(),
            manager.config_path().display()
        );
    } else {
        println!(
            "Config already exists at {}",
            manager.config_path().display()
        );
    }
    Ok(())
}

/// Print the effective config with the API key masked
pub fn config_show(config: &Config, db_path: &Path) -> Result<()> {
    let mut shown = config.clone();
    shown.remote.api_key = config.remote.masked_api_key();

    let toml = toml::to_string_pretty(&shown).context("Failed to serialize config")?;
    print!("{}", toml);
    println!("# database: {}", db_path.display());

    if let Err(errors) = config.validate() {
        for error in errors {
            println!("{} {}", style("!").yellow().bold(), error);
        }
    }
    Ok(())
}

pub fn config_path(manager: &ConfigManager) -> Result<()> {
    println!("{}", manager.config_path().display());
    Ok(())
}

fn print_outcome(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Skipped(reason) => {
            println!("{} Sync skipped: {}", style("-").dim(), reason);
        }
        SyncOutcome::Completed(report) => print_report(report),
    }
}

fn print_report(report: &DrainReport) {
    let mark = if report.is_clean() {
        style("✓").green().bold()
    } else {
        style("!").yellow().bold()
    };
    println!(
        "{} Synced {} of {} change(s)",
        mark,
        report.succeeded.len(),
        report.attempted
    );
    if !report.retried.is_empty() {
        println!("  {} will retry on the next sync", report.retried.len());
    }
    if !report.dropped.is_empty() {
        println!(
            "  {} dropped after failing permanently",
            style(report.dropped.len()).red()
        );
        for id in &report.dropped {
            println!("    {}", id);
        }
    }
}

fn print_item_summary(item: &QueueItem, max_attempts: u32, now: DateTime<Utc>) {
    println!(
        "\n{} {}",
        style(item.action().to_string()).bold(),
        style(item.target()).bold()
    );
    print!("  ID: {}", truncate(item.id().as_str(), 8));
    if let Some(record_id) = item.record_id() {
        print!(" | Record: {}", record_id);
    }
    println!(
        " | Queued: {} ({})",
        item.enqueued_at().with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        format_age(now - item.enqueued_at())
    );
    if item.attempts() > 0 {
        println!(
            "  {}",
            style(format!("Failed {}/{} attempts", item.attempts(), max_attempts)).yellow()
        );
    }
}

fn format_last_sync(last_sync: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match last_sync {
        Some(at) => format!(
            "{} ({})",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            format_age(now - at)
        ),
        None => "never".to_string(),
    }
}

fn format_age(age: chrono::Duration) -> String {
    let seconds = age.num_seconds().max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours >= 24 {
        format!("{}d ago", hours / 24)
    } else if hours > 0 {
        format!("{}h {}m ago", hours, minutes)
    } else if minutes > 0 {
        format!("{}m ago", minutes)
    } else {
        "just now".to_string()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests;
