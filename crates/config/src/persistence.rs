//! Reading and writing `config.toml`

use crate::migration::migrate_to_latest;
use crate::{Config, ConfigError, ConfigResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// The config file on disk
///
/// Writes go through a temp file in the same directory and a rename, and
/// the previous contents are copied to `config.toml.backup` first.
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the previous version is kept after each write
    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension("toml.backup")
    }

    /// Reads, upgrades and parses the file
    ///
    /// A missing file yields defaults. An empty file is an error. Files from
    /// an older version are rewritten in the current format. Invalid values
    /// are only logged so a hand edit never locks the user out.
    pub fn read(&self) -> ConfigResult<Config> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", self.path.display());
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if text.trim().is_empty() {
            return Err(ConfigError::Empty {
                path: self.path.clone(),
            });
        }

        let mut table: toml::Table = toml::from_str(&text).map_err(|e| self.parse_error(e))?;
        let upgraded = migrate_to_latest(&mut table)?;
        let config: Config = toml::Value::Table(table)
            .try_into()
            .map_err(|e| self.parse_error(e))?;

        if upgraded {
            match self.write(&config) {
                Ok(()) => log::info!(
                    "Upgraded {}; the old file is at {}",
                    self.path.display(),
                    self.backup_path().display()
                ),
                Err(e) => log::warn!("Using upgraded config without saving it: {}", e),
            }
        }

        if let Err(problems) = config.validate() {
            for problem in &problems {
                log::warn!("{}: {}", self.path.display(), problem);
            }
        }

        Ok(config)
    }

    /// Validates, backs up the current file and replaces it
    pub fn write(&self, config: &Config) -> ConfigResult<()> {
        config.validate().map_err(ConfigError::Invalid)?;
        let body = toml::to_string_pretty(config)?;

        if self.path.exists() {
            fs::copy(&self.path, self.backup_path()).map_err(|source| ConfigError::Write {
                path: self.backup_path(),
                source,
            })?;
        }
        self.replace_with(&body)?;

        log::debug!("Wrote {}", self.path.display());
        Ok(())
    }

    /// Writes the defaults under a commented header
    pub fn write_default(&self) -> ConfigResult<()> {
        let body = toml::to_string_pretty(&Config::default())?;
        self.replace_with(&format!("{}{}", DEFAULT_HEADER, body))?;
        log::info!("Wrote default config to {}", self.path.display());
        Ok(())
    }

    fn replace_with(&self, contents: &str) -> ConfigResult<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let io_error = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(io_error)?;
        let mut staged = NamedTempFile::new_in(dir).map_err(io_error)?;
        staged.write_all(contents.as_bytes()).map_err(io_error)?;
        staged.as_file().sync_all().map_err(io_error)?;
        staged.persist(&self.path).map_err(|e| io_error(e.error))?;
        Ok(())
    }

    fn parse_error(&self, source: toml::de::Error) -> ConfigError {
        ConfigError::Parse {
            path: self.path.clone(),
            source,
        }
    }
}

const DEFAULT_HEADER: &str = "\
# MarketSync configuration
#
# [sync]     offline queue: retry ceiling, per-call timeout, auto sync
# [remote]   REST endpoint and API key
# [network]  connectivity probe URLs and interval
# [storage]  SQLite database path, relative to this directory
#
# Environment variables named MARKETSYNC_<SECTION>_<FIELD> override values here.

";
