//! Configuration migration system
//!
//! Migrations run on the raw TOML table before it is deserialized, so
//! renamed or restructured keys are never silently dropped.

use crate::{ConfigError, ConfigResult, CONFIG_VERSION};
use toml::{Table, Value};

/// A single step from one file format version to the next
pub trait Migration {
    /// Returns the version this migration upgrades TO
    fn target_version(&self) -> u32;

    /// Performs the migration
    fn migrate(&self, table: &mut Table) -> ConfigResult<()>;
}

/// Version recorded in a config table
///
/// Files without a version are hand-written and treated as current.
pub fn file_version(table: &Table) -> u32 {
    table
        .get("version")
        .and_then(Value::as_integer)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(CONFIG_VERSION)
}

/// Upgrades a config table to the latest version in place
///
/// Returns true if anything was migrated.
pub fn migrate_to_latest(table: &mut Table) -> ConfigResult<bool> {
    let version = file_version(table);

    if version == CONFIG_VERSION {
        return Ok(false);
    }

    if version > CONFIG_VERSION {
        log::warn!(
            "Config version {} is newer than supported version {}. Attempting to use as-is.",
            version,
            CONFIG_VERSION
        );
        return Ok(false);
    }

    log::info!(
        "Migrating config from version {} to {}",
        version,
        CONFIG_VERSION
    );

    let mut current_version = version;
    while current_version < CONFIG_VERSION {
        let next_version = current_version + 1;

        match get_migration(next_version) {
            Some(migration) => {
                migration.migrate(table)?;
                log::info!("Applied migration to version {}", migration.target_version());
            }
            None => {
                return Err(ConfigError::Migration {
                    from: version,
                    reason: format!("no migration to version {}", next_version),
                })
            }
        }

        current_version = next_version;
    }

    table.insert("version".to_string(), Value::Integer(i64::from(CONFIG_VERSION)));
    Ok(true)
}

/// Returns the migration for a specific version, if one exists
fn get_migration(version: u32) -> Option<Box<dyn Migration>> {
    match version {
        2 => Some(Box::new(MigrationV2)),
        _ => None,
    }
}

/// Version 2 renamed `sync.retry_limit` and `remote.url`
struct MigrationV2;

impl Migration for MigrationV2 {
    fn target_version(&self) -> u32 {
        2
    }

    fn migrate(&self, table: &mut Table) -> ConfigResult<()> {
        rename_key(table, "sync", "retry_limit", "max_attempts")?;
        rename_key(table, "remote", "url", "base_url")?;
        Ok(())
    }
}

/// Moves `section.from` to `section.to` unless `to` is already set
fn rename_key(table: &mut Table, section: &str, from: &str, to: &str) -> ConfigResult<()> {
    let Some(section_value) = table.get_mut(section) else {
        return Ok(());
    };
    let section_table = section_value
        .as_table_mut()
        .ok_or_else(|| ConfigError::Migration {
            from: 1,
            reason: format!("[{}] is not a table", section),
        })?;

    if let Some(old_value) = section_table.remove(from) {
        if !section_table.contains_key(to) {
            section_table.insert(to.to_string(), old_value);
        }
    }
    Ok(())
}
