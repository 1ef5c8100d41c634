// crates/resilience/src/lib.rs
//! Resilience patterns for the offline sync pipeline
//!
//! This module provides:
//! - Bounded timeouts for individual async operations
//! - A retry ceiling policy with an optional error classification hook
//!
//! # Example
//!
//! ```rust
//! use marketsync_resilience::{RetryPolicy, Timeout};
//! use std::time::Duration;
//!
//! // Give up after five failed attempts
//! let policy = RetryPolicy::new(5);
//! assert!(policy.is_exhausted(5));
//!
//! // Bound each remote call to 30 seconds
//! let timeout = Timeout::new(Duration::from_secs(30));
//! assert_eq!(timeout.duration(), Duration::from_secs(30));
//! ```

mod error;
mod retry;
mod timeout;

pub use error::{ResilienceError, ResilienceResult};
pub use retry::{Retryable, RetryPolicy};
pub use timeout::{with_timeout, Timeout};
