// crates/network/src/connectivity.rs
//! Network connectivity checks

use crate::client::Client;
use crate::error::{NetworkError, NetworkResult};
use futures::future::select_ok;
use marketsync_resilience::with_timeout;
use marketsync_sync_engine::NetworkMonitor;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// URLs probed when none are configured
pub const DEFAULT_PROBE_URLS: [&str; 2] = ["https://www.google.com", "https://www.cloudflare.com"];

/// Default delay between probe rounds
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);

/// Network connectivity checker
#[derive(Debug, Clone)]
pub struct ConnectivityChecker {
    client: Client,
    check_urls: Vec<String>,
}

impl ConnectivityChecker {
    /// Creates a new connectivity checker with default URLs
    pub fn new(client: Client) -> Self {
        Self::with_urls(
            client,
            DEFAULT_PROBE_URLS.iter().map(|u| u.to_string()).collect(),
        )
    }

    /// Creates a connectivity checker with custom URLs
    pub fn with_urls(client: Client, urls: Vec<String>) -> Self {
        Self {
            client,
            check_urls: urls,
        }
    }

    /// URLs this checker probes
    pub fn urls(&self) -> &[String] {
        &self.check_urls
    }

    /// Checks if network is available
    ///
    /// All URLs are probed concurrently; the first success wins.
    pub async fn is_online(&self) -> bool {
        if self.check_urls.is_empty() {
            return false;
        }

        let probes = self
            .check_urls
            .iter()
            .map(|url| Box::pin(self.client.head(url)));
        select_ok(probes).await.is_ok()
    }

    /// Checks network connectivity and returns error if offline
    pub async fn check(&self) -> NetworkResult<()> {
        if self.is_online().await {
            Ok(())
        } else {
            Err(NetworkError::NetworkUnavailable)
        }
    }

    /// Estimates network latency by timing a HEAD request
    pub async fn estimate_latency(&self, url: &str) -> NetworkResult<Duration> {
        let start = std::time::Instant::now();
        self.client.head(url).await?;
        Ok(start.elapsed())
    }
}

/// Feeds connectivity checks into a [`NetworkMonitor`]
///
/// The monitor only notifies on transitions, so repeated identical
/// results are free.
pub struct ConnectivityProbe {
    checker: ConnectivityChecker,
    monitor: Arc<NetworkMonitor>,
    interval: Duration,
}

impl ConnectivityProbe {
    /// Creates a probe with the default interval
    pub fn new(checker: ConnectivityChecker, monitor: Arc<NetworkMonitor>) -> Self {
        Self {
            checker,
            monitor,
            interval: DEFAULT_PROBE_INTERVAL,
        }
    }

    /// Sets the delay between probe rounds
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Delay between probe rounds
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one probe round and updates the monitor
    ///
    /// A round that outlasts the interval counts as offline.
    pub async fn check_once(&self) -> bool {
        let online = match with_timeout(self.interval, self.checker.is_online()).await {
            Ok(online) => online,
            Err(e) => {
                log::warn!("Connectivity probe failed: {}", e);
                false
            }
        };

        if !online {
            log::debug!("Connectivity probe found no reachable host");
        }
        self.monitor.set_connected(online);
        online
    }

    /// Probes forever on the current runtime
    ///
    /// The first round runs immediately. Abort the handle to stop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.check_once().await;
            }
        })
    }
}
