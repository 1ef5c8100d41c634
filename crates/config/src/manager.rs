//! Config directory handling and environment overrides

use crate::persistence::ConfigFile;
use crate::{Config, ConfigError, ConfigResult, LogLevel};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Prefix of environment variables that override file values
pub const ENV_PREFIX: &str = "MARKETSYNC";

/// Where MarketSync keeps its settings, and the operations on them
///
/// The config file and, by default, the queue database both live in one
/// per-user directory.
pub struct ConfigManager {
    file: ConfigFile,
    dir: PathBuf,
}

impl ConfigManager {
    /// Uses the platform config directory
    ///
    /// - Linux: `~/.config/marketsync/`
    /// - macOS: `~/Library/Application Support/marketsync/`
    /// - Windows: `%APPDATA%\marketsync\config\`
    pub fn new() -> ConfigResult<Self> {
        let dirs = ProjectDirs::from("", "", "marketsync").ok_or(ConfigError::NoConfigDir)?;
        Self::with_directory(dirs.config_dir().to_path_buf())
    }

    /// Uses `dir` instead of the platform directory (`--config`, tests)
    pub fn with_directory(dir: PathBuf) -> ConfigResult<Self> {
        Ok(Self {
            file: ConfigFile::new(dir.join("config.toml")),
            dir,
        })
    }

    pub fn config_path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Queue database for `config`; a relative `storage.database_path` sits
    /// next to the config file
    pub fn database_path(&self, config: &Config) -> PathBuf {
        config.storage.resolve_database_path(&self.dir)
    }

    /// Reads the file, upgrading older versions; defaults if it is missing
    pub fn load(&self) -> ConfigResult<Config> {
        self.file.read()
    }

    /// Like [`ConfigManager::load`], but any error is logged and replaced by defaults
    pub fn load_or_default(&self) -> Config {
        self.load().unwrap_or_else(|e| {
            log::warn!("{}; continuing with default settings", e);
            Config::default()
        })
    }

    /// Writes `config`, refusing invalid values
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.file.write(config)
    }

    /// Read-modify-write of the file
    ///
    /// ```rust,no_run
    /// # use marketsync_config::ConfigManager;
    /// # let manager = ConfigManager::new().unwrap();
    /// manager.update(|config| config.sync.auto_sync = false)?;
    /// # Ok::<(), marketsync_config::ConfigError>(())
    /// ```
    pub fn update<F>(&self, edit: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        edit(&mut config);
        self.save(&config)
    }

    /// Writes a commented default file unless one exists
    ///
    /// Returns whether a file was written.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.file.path().exists() {
            log::debug!("Keeping existing {}", self.file.path().display());
            return Ok(false);
        }
        self.file.write_default()?;
        Ok(true)
    }

    /// Replaces the file with defaults; the old one is kept as the backup
    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// [`ConfigManager::load`] followed by `MARKETSYNC_*` overrides from the
    /// process environment
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |name| std::env::var(name).ok());

        if let Err(problems) = config.validate() {
            for problem in problems {
                log::warn!("After environment overrides: {}", problem);
            }
        }
        Ok(config)
    }
}

/// Applies `MARKETSYNC_<SECTION>_<FIELD>` overrides read through `lookup`
///
/// Values that fail to parse are logged and ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| lookup(&format!("{}_{}", ENV_PREFIX, suffix));

    if let Some(url) = var("REMOTE_BASE_URL") {
        config.remote.base_url = url;
    }

    if let Some(key) = var("REMOTE_API_KEY") {
        config.remote.api_key = key;
    }

    if let Some(attempts) = var("SYNC_MAX_ATTEMPTS") {
        match attempts.trim().parse::<u32>() {
            Ok(n) => config.sync.max_attempts = n,
            Err(e) => log::warn!(
                "Ignoring {}_SYNC_MAX_ATTEMPTS={:?}: {}",
                ENV_PREFIX,
                attempts,
                e
            ),
        }
    }

    if let Some(path) = var("STORAGE_DATABASE_PATH") {
        config.storage.database_path = PathBuf::from(path);
    }

    if let Some(level) = var("APP_LOG_LEVEL") {
        match level.parse::<LogLevel>() {
            Ok(level) => config.app.log_level = level,
            Err(e) => log::warn!("Ignoring {}_APP_LOG_LEVEL: {}", ENV_PREFIX, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn in_temp_dir() -> (TempDir, ConfigManager) {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_directory(dir.path().to_path_buf()).unwrap();
        (dir, manager)
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_platform_directory_resolves() {
        let manager = ConfigManager::new().unwrap();
        assert!(manager.config_path().ends_with("config.toml"));
    }

    #[test]
    fn test_fresh_directory_loads_defaults() {
        let (_dir, manager) = in_temp_dir();
        assert_eq!(manager.load_or_default(), Config::default());
        assert!(!manager.config_path().exists());
    }

    #[test]
    fn test_update_persists_remote_change() {
        let (_dir, manager) = in_temp_dir();
        manager
            .update(|config| config.remote.base_url = "https://abc.supabase.co".to_string())
            .unwrap();

        assert_eq!(manager.load().unwrap().remote.base_url, "https://abc.supabase.co");
    }

    #[test]
    fn test_update_refuses_invalid_edit() {
        let (_dir, manager) = in_temp_dir();
        manager.initialize().unwrap();

        let result = manager.update(|config| config.sync.call_timeout_secs = 0);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        assert_eq!(manager.load().unwrap().sync.call_timeout_secs, 30);
    }

    #[test]
    fn test_initialize_only_once() {
        let (_dir, manager) = in_temp_dir();
        assert!(manager.initialize().unwrap());

        manager
            .update(|config| config.sync.auto_sync = false)
            .unwrap();
        assert!(!manager.initialize().unwrap());
        assert!(!manager.load().unwrap().sync.auto_sync);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let (_dir, manager) = in_temp_dir();
        manager.update(|config| config.sync.max_attempts = 9).unwrap();

        manager.reset().unwrap();
        assert_eq!(manager.load().unwrap(), Config::default());
    }

    #[test]
    fn test_hand_edited_problem_is_loaded_with_warning() {
        let (_dir, manager) = in_temp_dir();
        std::fs::write(manager.config_path(), "[sync]\nmax_attempts = 0\n").unwrap();

        let config = manager.load().unwrap();
        let problems = config.validate().unwrap_err();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].field, "sync.max_attempts");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("MARKETSYNC_REMOTE_BASE_URL", "https://shop.example.co"),
                ("MARKETSYNC_REMOTE_API_KEY", "anon"),
                ("MARKETSYNC_SYNC_MAX_ATTEMPTS", " 7 "),
                ("MARKETSYNC_STORAGE_DATABASE_PATH", "/tmp/queue.db"),
                ("MARKETSYNC_APP_LOG_LEVEL", "debug"),
            ]),
        );

        assert_eq!(config.remote.base_url, "https://shop.example.co");
        assert_eq!(config.remote.api_key, "anon");
        assert_eq!(config.sync.max_attempts, 7);
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/queue.db"));
        assert_eq!(config.app.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_unparseable_env_values_are_ignored() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("MARKETSYNC_SYNC_MAX_ATTEMPTS", "lots"),
                ("MARKETSYNC_APP_LOG_LEVEL", "loud"),
            ]),
        );
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_database_sits_next_to_config_file() {
        let (dir, manager) = in_temp_dir();
        let mut config = Config::default();
        assert_eq!(manager.database_path(&config), dir.path().join("marketsync.db"));

        config.storage.database_path = PathBuf::from("/srv/marketsync/queue.db");
        assert_eq!(
            manager.database_path(&config),
            PathBuf::from("/srv/marketsync/queue.db")
        );
    }
}
