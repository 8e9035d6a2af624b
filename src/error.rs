//! Error types for the cache
//!
//! Construction is the only fallible surface: upstream failures are
//! ordinary values, not errors, and never propagate as panics.

use std::time::Duration;

use thiserror::Error;

// == Cache Error Enum ==
/// Errors raised when a cache is configured inconsistently.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The capacity bound must leave room for at least two entries.
    #[error("max_count must be at least 2, got {0}")]
    CapacityTooSmall(usize),

    /// The soft limit may not exceed the hard limit.
    #[error("soft limit {soft:?} must not exceed hard limit {hard:?}")]
    LimitsInverted { soft: Duration, hard: Duration },
}

// == Result Type Alias ==
/// Convenience Result type for cache construction.
pub type Result<T> = std::result::Result<T, CacheError>;
