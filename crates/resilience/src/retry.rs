// crates/resilience/src/retry.rs
//! Retry ceiling policy

/// Errors that know whether retrying them can ever succeed
pub trait Retryable {
    /// Returns true if a later attempt might succeed
    fn is_retryable(&self) -> bool;
}

/// Retry policy configuration
///
/// Attempts are counted by the caller across independent passes; the policy
/// only decides when to give up on an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of failed attempts before giving up
    max_attempts: u32,
    /// Whether non-retryable errors give up immediately
    classify_errors: bool,
}

impl RetryPolicy {
    /// Creates a new retry policy that treats every error alike
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            classify_errors: false,
        }
    }

    /// Sets whether non-retryable errors exhaust the policy immediately
    pub fn with_error_classification(mut self, classify: bool) -> Self {
        self.classify_errors = classify;
        self
    }

    /// Returns the maximum number of attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns true if non-retryable errors give up immediately
    pub fn classifies_errors(&self) -> bool {
        self.classify_errors
    }

    /// Returns true once `failed_attempts` has reached the ceiling
    pub fn is_exhausted(&self, failed_attempts: u32) -> bool {
        failed_attempts >= self.max_attempts
    }

    /// Decides whether to give up after a failure
    ///
    /// `failed_attempts` includes the failure being reported.
    pub fn should_give_up<E: Retryable + ?Sized>(&self, failed_attempts: u32, error: &E) -> bool {
        if self.is_exhausted(failed_attempts) {
            return true;
        }
        self.classify_errors && !error.is_retryable()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}
