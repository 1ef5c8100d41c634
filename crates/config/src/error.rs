//! Config crate errors

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a config file could not be loaded, upgraded or written
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file exists but holds nothing; defaults are not assumed
    #[error("{} is empty; delete it or run 'marketsync config init'", path.display())]
    Empty { path: PathBuf },

    #[error("{} is not valid config TOML: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Cannot encode config as TOML: {0}")]
    Encode(#[from] toml::ser::Error),

    /// Save was refused; the file on disk is untouched
    #[error("Refusing to save invalid config: {}", join_problems(.0))]
    Invalid(Vec<ValidationError>),

    /// Any filesystem failure while writing: directory, backup or the file itself
    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No per-user config directory on this platform")]
    NoConfigDir,

    #[error("Cannot upgrade config from version {from}: {reason}")]
    Migration { from: u32, reason: String },
}

fn join_problems(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One bad value, named by its dotted path (`sync.max_attempts`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub problem: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.problem)
    }
}

impl std::error::Error for ValidationError {}
