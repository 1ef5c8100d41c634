//! Connectivity probe configuration section

use crate::validation::{Checks, ConfigSection};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The `[network]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    /// URLs probed with HEAD requests; reachable if any answers
    pub probe_urls: Vec<String>,

    /// Seconds between probe rounds
    pub probe_interval_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_urls: vec![
                "https://www.google.com".to_string(),
                "https://www.cloudflare.com".to_string(),
            ],
            probe_interval_secs: 15,
        }
    }
}

impl NetworkConfig {
    /// Delay between probe rounds
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

impl ConfigSection for NetworkConfig {
    const NAME: &'static str = "network";

    fn check(&self, checks: &mut Checks<'_>) {
        checks.within("probe_interval_secs", self.probe_interval_secs, 1..=3600);

        if self.probe_urls.is_empty() {
            checks.fail("probe_urls", "must list at least one URL");
        }
        for (i, url) in self.probe_urls.iter().enumerate() {
            checks.http_url(&format!("probe_urls[{}]", i), url);
        }
    }

    fn merge(&mut self, other: Self) {
        self.probe_urls = other.probe_urls;
        self.probe_interval_secs = other.probe_interval_secs;
    }
}
