//! Local database configuration section

use crate::validation::{Checks, ConfigSection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The `[storage]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path (relative to config dir if not absolute)
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("marketsync.db"),
        }
    }
}

impl StorageConfig {
    /// Resolves the database path against `base_dir`
    pub fn resolve_database_path(&self, base_dir: &Path) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            base_dir.join(&self.database_path)
        }
    }
}

impl ConfigSection for StorageConfig {
    const NAME: &'static str = "storage";

    fn check(&self, checks: &mut Checks<'_>) {
        if self.database_path.as_os_str().is_empty() {
            checks.fail("database_path", "must not be empty");
        }
    }

    fn merge(&mut self, other: Self) {
        self.database_path = other.database_path;
    }
}
