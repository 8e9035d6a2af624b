//! Configuration Module
//!
//! Parameters for the demo binary, loaded from environment variables with
//! sensible defaults.

use std::env;
use std::time::Duration;

/// Demo run parameters.
///
/// All values can be configured via environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Age in milliseconds after which lookups attempt a refresh
    pub soft_limit_ms: u64,
    /// Age in milliseconds after which entries are never served
    pub hard_limit_ms: u64,
    /// Maximum number of entries the cache can hold
    pub max_count: usize,
    /// Fraction of simulated upstream calls that fail (0.0 to 1.0)
    pub failure_rate: f64,
    /// Latency in milliseconds of each simulated upstream call
    pub call_latency_ms: u64,
    /// Total number of lookups the demo performs
    pub requests: u64,
    /// Number of distinct keys the demo draws from
    pub key_space: usize,
    /// Background sweep interval in milliseconds
    pub sweep_interval_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SOFT_LIMIT_MS` - soft limit in ms (default: 8000)
    /// - `HARD_LIMIT_MS` - hard limit in ms (default: 24000)
    /// - `MAX_COUNT` - cache capacity (default: 4096)
    /// - `FAILURE_RATE` - upstream failure fraction (default: 0.1)
    /// - `CALL_LATENCY_MS` - upstream latency in ms (default: 1)
    /// - `REQUESTS` - lookups to perform (default: 1000000)
    /// - `KEY_SPACE` - distinct keys (default: 4096)
    /// - `SWEEP_INTERVAL_MS` - sweep frequency in ms (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            soft_limit_ms: env_or("SOFT_LIMIT_MS", defaults.soft_limit_ms),
            hard_limit_ms: env_or("HARD_LIMIT_MS", defaults.hard_limit_ms),
            max_count: env_or("MAX_COUNT", defaults.max_count),
            failure_rate: env_or("FAILURE_RATE", defaults.failure_rate),
            call_latency_ms: env_or("CALL_LATENCY_MS", defaults.call_latency_ms),
            requests: env_or("REQUESTS", defaults.requests),
            key_space: env_or("KEY_SPACE", defaults.key_space),
            sweep_interval_ms: env_or("SWEEP_INTERVAL_MS", defaults.sweep_interval_ms),
        }
    }

    /// Soft limit as a `Duration`.
    pub fn soft_limit(&self) -> Duration {
        Duration::from_millis(self.soft_limit_ms)
    }

    /// Hard limit as a `Duration`.
    pub fn hard_limit(&self) -> Duration {
        Duration::from_millis(self.hard_limit_ms)
    }

    /// Simulated upstream latency as a `Duration`.
    pub fn call_latency(&self) -> Duration {
        Duration::from_millis(self.call_latency_ms)
    }

    /// Background sweep interval as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            soft_limit_ms: 8_000,
            hard_limit_ms: 24_000,
            max_count: 4096,
            failure_rate: 0.1,
            call_latency_ms: 1,
            requests: 1_000_000,
            key_space: 4096,
            sweep_interval_ms: 1_000,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
