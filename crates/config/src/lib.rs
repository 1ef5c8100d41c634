//! Settings for the MarketSync offline sync stack
//!
//! One TOML file with five tables:
//!
//! - `[app]` log filter
//! - `[sync]` retry ceiling, call timeout and auto sync for the engine
//! - `[remote]` REST endpoint and API key
//! - `[network]` connectivity probe targets
//! - `[storage]` queue database location
//!
//! Files written by older releases are upgraded on load. Out-of-range values
//! load with a warning but are never written back.
//!
//! ```rust,no_run
//! use marketsync_config::ConfigManager;
//!
//! let manager = ConfigManager::new()?;
//! let config = manager.load_with_env_overrides()?;
//! let engine = config.sync.to_sync_config();
//! println!("{} (ceiling {})", config.remote.base_url, engine.max_attempts);
//! # Ok::<(), marketsync_config::ConfigError>(())
//! ```

mod error;
mod manager;
mod migration;
mod persistence;
mod validation;

// Config sections
pub mod app_config;
mod network_config;
mod remote_config;
mod storage_config;
mod sync_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::{apply_env_overrides, ConfigManager, ENV_PREFIX};
pub use validation::{Checks, ConfigSection};

pub use app_config::{AppConfig, LogLevel};
pub use network_config::NetworkConfig;
pub use remote_config::RemoteConfig;
pub use storage_config::StorageConfig;
pub use sync_config::SyncSettings;

use serde::{Deserialize, Serialize};
use validation::run_checks;

/// Format version written to new files; see `migration.rs` for the history
pub const CONFIG_VERSION: u32 = 2;

/// Everything in `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub app: AppConfig,
    pub sync: SyncSettings,
    pub remote: RemoteConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: Default::default(),
            sync: Default::default(),
            remote: Default::default(),
            network: Default::default(),
            storage: Default::default(),
        }
    }
}

impl Config {
    /// Every problem in every section, in file order
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut problems = Vec::new();
        run_checks(&self.app, &mut problems);
        run_checks(&self.sync, &mut problems);
        run_checks(&self.remote, &mut problems);
        run_checks(&self.network, &mut problems);
        run_checks(&self.storage, &mut problems);

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Takes every section from `other`
    pub fn merge(&mut self, other: Config) {
        let Config {
            version: _,
            app,
            sync,
            remote,
            network,
            storage,
        } = other;
        self.app.merge(app);
        self.sync.merge(sync);
        self.remote.merge(remote);
        self.network.merge(network);
        self.storage.merge(storage);
    }
}
