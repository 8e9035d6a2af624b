//! Rescue Cache - an in-process, bounded, read-through memoization cache
//! with two-stage time-based invalidation.
//!
//! A [`RescueCache`] fronts a single upstream query function. While the
//! upstream is healthy, callers see data at most a *soft limit* old: stale
//! entries are refreshed on lookup. When the upstream fails transiently,
//! the last known good value is still served (a *rescue*) until it reaches
//! the *hard limit*. Setting the soft limit to zero turns the cache into a
//! pure availability shield that serves cached data only when the upstream
//! is down.
//!
//! Reclamation is bulk, not per-entry: create times are filed into a
//! coarse [`ExpiryTimeline`] of time buckets, and expiry rotates whole
//! buckets out of the window instead of scanning entries.
//!
//! ```
//! use std::time::Duration;
//! use rescue_cache::RescueCache;
//!
//! let cache = RescueCache::new(
//!     |_: &(), key: &str| Some(format!("value for {key}")),
//!     Duration::from_secs(15),
//!     Duration::from_secs(300),
//!     1024,
//! )
//! .unwrap();
//!
//! assert_eq!(cache.get(&(), "a"), Some("value for a".to_string()));
//! assert_eq!(cache.stats().cache_new_item_count, 1);
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheEntry, CacheStats, ExpiryTimeline, RescueCache};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::{spawn_sweeper_task, SweeperHandle};
