//! Per-section validation
//!
//! A section reports problems into a [`Checks`] scoped to its table name,
//! so it only spells out its own keys.

use std::fmt::{Debug, Display};
use std::ops::RangeInclusive;

pub use crate::error::ValidationError;

/// One `[table]` of the config file
pub trait ConfigSection: Default {
    /// Table name, used as the prefix of every reported field
    const NAME: &'static str;

    /// Reports every problem with this section
    fn check(&self, checks: &mut Checks<'_>);

    /// Takes every value from `other`
    fn merge(&mut self, other: Self);

    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        run_checks(self, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Runs `section`'s checks, appending its problems to `errors`
pub(crate) fn run_checks<S: ConfigSection>(section: &S, errors: &mut Vec<ValidationError>) {
    section.check(&mut Checks {
        section: S::NAME,
        errors,
    });
}

/// Problem sink for one section
pub struct Checks<'a> {
    section: &'static str,
    errors: &'a mut Vec<ValidationError>,
}

impl Checks<'_> {
    /// Records a problem with `key` unconditionally
    pub fn fail(&mut self, key: &str, problem: impl Into<String>) -> &mut Self {
        self.errors
            .push(ValidationError::new(format!("{}.{}", self.section, key), problem));
        self
    }

    pub fn within<T>(&mut self, key: &str, value: T, bounds: RangeInclusive<T>) -> &mut Self
    where
        T: PartialOrd + Display + Debug,
    {
        if !bounds.contains(&value) {
            self.fail(key, format!("must be in {:?}, got {}", bounds, value));
        }
        self
    }

    pub fn filled(&mut self, key: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.fail(key, "must not be empty");
        }
        self
    }

    /// Requires an absolute `http://` or `https://` URL with a host
    pub fn http_url(&mut self, key: &str, value: &str) -> &mut Self {
        let host = value
            .strip_prefix("https://")
            .or_else(|| value.strip_prefix("http://"));
        if !matches!(host, Some(h) if !h.is_empty() && !h.starts_with('/')) {
            self.fail(key, format!("must be an http(s) URL, got {:?}", value));
        }
        self
    }
}
