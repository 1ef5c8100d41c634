//! Remote data API configuration section

use crate::validation::{Checks, ConfigSection};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The `[remote]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Project URL; tables live under `{base_url}/rest/v1/`
    pub base_url: String,

    /// API key sent with every request; empty for none
    pub api_key: String,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl RemoteConfig {
    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The API key with all but its last four characters hidden
    pub fn masked_api_key(&self) -> String {
        let n = self.api_key.chars().count();
        if n <= 4 {
            return "*".repeat(n);
        }
        let visible: String = self.api_key.chars().skip(n - 4).collect();
        format!("{}{}", "*".repeat(n - 4), visible)
    }
}

impl ConfigSection for RemoteConfig {
    const NAME: &'static str = "remote";

    fn check(&self, checks: &mut Checks<'_>) {
        checks
            .http_url("base_url", &self.base_url)
            .within("request_timeout_secs", self.request_timeout_secs, 1..=300);
    }

    fn merge(&mut self, other: Self) {
        self.base_url = other.base_url;
        self.api_key = other.api_key;
        self.request_timeout_secs = other.request_timeout_secs;
    }
}
