//! Cache Statistics Module
//!
//! Tracks how each lookup was satisfied: from a fresh entry, from the
//! upstream, or from a stale entry rescued after an upstream failure.

use serde::Serialize;

// == Cache Stats ==
/// Monotonic cache counters.
///
/// Counters only ever grow, except through
/// [`get_and_reset_stats`](crate::cache::RescueCache::get_and_reset_stats),
/// which zeroes them atomically after snapshotting. The serialized form is
/// a flat JSON object with one integer field per counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CacheStats {
    /// Lookups served from a cached entry younger than the soft limit.
    pub cache_hit_count: u64,
    /// Lookups on a stale entry where the upstream refresh succeeded.
    pub cache_miss_count: u64,
    /// Lookups served from a stale entry because the upstream failed and
    /// the entry was still inside the hard limit.
    pub cache_rescue_count: u64,
    /// Previously absent keys fetched from the upstream and stored.
    pub cache_new_item_count: u64,
    /// Absent keys fetched at capacity; the result was returned but not
    /// stored.
    pub cache_no_room_count: u64,
    /// Lookups where the caller observed a failure.
    pub cache_request_fail_count: u64,
    /// Successful explicit invalidations.
    pub explicit_invalidation_count: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Fraction of lookups answered without a successful upstream round
    /// trip being required, or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.requests();
        if total == 0 {
            0.0
        } else {
            (self.cache_hit_count + self.cache_rescue_count) as f64 / total as f64
        }
    }

    // == Requests ==
    /// Total lookups observed since the last reset.
    pub fn requests(&self) -> u64 {
        self.cache_hit_count
            + self.cache_miss_count
            + self.cache_rescue_count
            + self.cache_new_item_count
            + self.cache_no_room_count
            + self.cache_request_fail_count
    }

    // == Recorders ==
    /// Fresh cached entry served.
    pub fn record_hit(&mut self) {
        self.cache_hit_count += 1;
    }

    /// Stale entry refreshed from the upstream.
    pub fn record_miss(&mut self) {
        self.cache_miss_count += 1;
    }

    /// Stale entry served after a failed refresh.
    pub fn record_rescue(&mut self) {
        self.cache_rescue_count += 1;
    }

    /// Absent key fetched and stored.
    pub fn record_new_item(&mut self) {
        self.cache_new_item_count += 1;
    }

    /// Absent key fetched at capacity, not stored.
    pub fn record_no_room(&mut self) {
        self.cache_no_room_count += 1;
    }

    /// Caller observed a failure.
    pub fn record_request_fail(&mut self) {
        self.cache_request_fail_count += 1;
    }

    /// Explicit invalidation removed an entry.
    pub fn record_invalidation(&mut self) {
        self.explicit_invalidation_count += 1;
    }
}
