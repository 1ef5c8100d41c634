//! Offline sync configuration section

use crate::validation::{Checks, ConfigSection};
use marketsync_sync_engine::{SyncConfig, DEFAULT_LAST_SYNC_KEY, DEFAULT_QUEUE_KEY};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The `[sync]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    /// Failed attempts after which a queued mutation is dropped
    pub max_attempts: u32,

    /// Upper bound on each remote call, in seconds
    pub call_timeout_secs: u64,

    /// Sync automatically after enqueues and reconnects
    pub auto_sync: bool,

    /// Drop mutations the server rejects outright instead of retrying them
    pub drop_permanent_errors: bool,

    /// Storage key for the serialized queue
    pub queue_key: String,

    /// Storage key for the last sync timestamp
    pub last_sync_key: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            call_timeout_secs: 30,
            auto_sync: true,
            drop_permanent_errors: false,
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            last_sync_key: DEFAULT_LAST_SYNC_KEY.to_string(),
        }
    }
}

impl SyncSettings {
    /// Engine configuration for these settings
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            max_attempts: self.max_attempts,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            auto_sync: self.auto_sync,
            drop_permanent_errors: self.drop_permanent_errors,
            queue_key: self.queue_key.clone(),
            last_sync_key: self.last_sync_key.clone(),
        }
    }
}

impl ConfigSection for SyncSettings {
    const NAME: &'static str = "sync";

    fn check(&self, checks: &mut Checks<'_>) {
        checks
            .within("max_attempts", self.max_attempts, 1..=100)
            .within("call_timeout_secs", self.call_timeout_secs, 1..=600)
            .filled("queue_key", &self.queue_key)
            .filled("last_sync_key", &self.last_sync_key);

        if self.queue_key == self.last_sync_key {
            checks.fail("last_sync_key", "must differ from sync.queue_key");
        }
    }

    fn merge(&mut self, other: Self) {
        self.max_attempts = other.max_attempts;
        self.call_timeout_secs = other.call_timeout_secs;
        self.auto_sync = other.auto_sync;
        self.drop_permanent_errors = other.drop_permanent_errors;
        self.queue_key = other.queue_key;
        self.last_sync_key = other.last_sync_key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SyncSettings::default().validate().is_ok());
    }

    #[test]
    fn test_defaults_match_engine() {
        assert_eq!(SyncSettings::default().to_sync_config(), SyncConfig::default());
    }

    #[test]
    fn test_invalid_max_attempts() {
        let mut config = SyncSettings::default();
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        config.max_attempts = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_keys_must_differ() {
        let mut config = SyncSettings::default();
        config.last_sync_key = config.queue_key.clone();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "sync.last_sync_key");
    }

    #[test]
    fn test_to_sync_config() {
        let settings = SyncSettings {
            max_attempts: 3,
            call_timeout_secs: 10,
            auto_sync: false,
            drop_permanent_errors: true,
            ..Default::default()
        };

        let config = settings.to_sync_config();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.call_timeout, Duration::from_secs(10));
        assert!(!config.auto_sync);
        assert!(config.drop_permanent_errors);
        assert!(config.retry_policy().classifies_errors());
    }
}
