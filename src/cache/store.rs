//! Cache Store Module
//!
//! The read-through cache engine: a key index combined with the expiry
//! timeline, a bounded capacity policy, and per-lookup statistics.
//!
//! Lookups probe the index under a shared read acquisition; the upstream
//! query runs with no lock held; every mutation of index, timeline, count,
//! or stats happens under a single exclusive acquisition.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::warn;

use crate::cache::{CacheEntry, CacheStats, ExpiryTimeline, Nanos, TIMELINE_BUCKETS};
use crate::error::{CacheError, Result};

// == Cache State ==
/// Everything guarded by the store's lock.
struct CacheState {
    /// Key index; owns the entries.
    index: HashMap<String, CacheEntry>,
    /// Bucketed expiry schedule; tracks every indexed key by value.
    timeline: ExpiryTimeline,
    /// Live entry count; always equals `index.len()`.
    count: usize,
    /// Per-lookup counters.
    stats: CacheStats,
}

impl CacheState {
    /// Rotates the timeline forward to `now`, dropping every entry whose
    /// bucket has fallen out of the window.
    fn expire_stale(&mut self, now: Nanos) {
        let CacheState {
            index,
            timeline,
            count,
            ..
        } = self;
        timeline.expire_items(now, |key| {
            if index.remove(key).is_some() {
                *count -= 1;
            }
        });
        debug_assert_eq!(self.count, self.index.len());
    }

    /// Writes `value` under `key` with create time `now`, keeping the
    /// timeline in step with the index. Must run after `expire_stale(now)`
    /// so that `now` addresses the head bucket.
    ///
    /// The entry's current create time is re-read here, under the
    /// exclusive lock, so racing refreshes leave the key in exactly one
    /// bucket.
    fn store(&mut self, key: &str, value: String, now: Nanos) {
        let previous = self.index.get(key).map(|entry| entry.created_at);
        let tracked = match previous {
            Some(created_at) => self.timeline.replace_item(key, created_at, now),
            None => self.timeline.add_item(key, now),
        };
        if !tracked {
            // Unreachable once the timeline has been rotated to `now`;
            // refuse the write rather than let index and timeline drift.
            warn!(key, "timeline rejected write, dropping entry");
            if self.index.remove(key).is_some() {
                self.count -= 1;
            }
            return;
        }
        if self
            .index
            .insert(key.to_owned(), CacheEntry::new(value, now))
            .is_none()
        {
            self.count += 1;
        }
        debug_assert_eq!(self.count, self.index.len());
    }
}

// == Rescue Cache ==
/// An in-process, bounded, read-through memoization cache with two-stage
/// time-based invalidation.
///
/// While the upstream is healthy, callers see data at most `soft_limit`
/// old; while it fails, the last known good value is still served until it
/// reaches `hard_limit`.
///
/// `C` is an opaque caller context threaded to the query function on every
/// refresh; the cache never inspects it. The query function returns
/// `Some(value)` on success (an empty string is a valid value and is
/// cached) and `None` on a transient failure.
///
/// Concurrent lookups for the same absent key may each invoke the
/// upstream; the later writer wins. The upstream is never retried within a
/// single lookup.
pub struct RescueCache<C, F>
where
    F: Fn(&C, &str) -> Option<String>,
{
    state: RwLock<CacheState>,
    query: F,
    /// Age at which a lookup prefers to refresh, in nanos.
    soft_limit: Nanos,
    /// Age at which an entry may no longer be served, in nanos.
    hard_limit: Nanos,
    /// Hard bound on live entries.
    max_count: usize,
    /// Clock origin; all timestamps are nanos elapsed since this instant.
    origin: Instant,
    _context: PhantomData<fn(&C)>,
}

impl<C, F> RescueCache<C, F>
where
    F: Fn(&C, &str) -> Option<String>,
{
    // == Constructor ==
    /// Creates a cache backed by `query`.
    ///
    /// # Arguments
    /// * `query` - the upstream hook; called on every refresh
    /// * `soft_limit` - age beyond which lookups attempt a refresh
    /// * `hard_limit` - age beyond which entries are never served
    /// * `max_count` - capacity bound, at least 2
    ///
    /// # Errors
    /// Fails when `max_count < 2` or `soft_limit > hard_limit`.
    pub fn new(
        query: F,
        soft_limit: Duration,
        hard_limit: Duration,
        max_count: usize,
    ) -> Result<Self> {
        if max_count < 2 {
            return Err(CacheError::CapacityTooSmall(max_count));
        }
        if soft_limit > hard_limit {
            return Err(CacheError::LimitsInverted {
                soft: soft_limit,
                hard: hard_limit,
            });
        }
        Ok(Self {
            state: RwLock::new(CacheState {
                index: HashMap::new(),
                timeline: ExpiryTimeline::new(TIMELINE_BUCKETS, hard_limit, 0),
                count: 0,
                stats: CacheStats::new(),
            }),
            query,
            soft_limit: soft_limit.as_nanos() as Nanos,
            hard_limit: hard_limit.as_nanos() as Nanos,
            max_count,
            origin: Instant::now(),
            _context: PhantomData,
        })
    }

    /// Nanoseconds elapsed on this cache's clock.
    fn now(&self) -> Nanos {
        self.origin.elapsed().as_nanos() as Nanos
    }

    // == Get ==
    /// Looks up `key`, refreshing from the upstream as the entry's age
    /// requires.
    ///
    /// * Fresh entry (age below the soft limit): served as-is.
    /// * Stale entry: the upstream is queried; on success the fresh value
    ///   is stored and returned, on failure the stale value is served as
    ///   long as it is still inside the hard limit.
    /// * Absent key: the upstream is queried; a successful result is
    ///   stored if the cache has room, and returned either way.
    ///
    /// Returns `None` only when the upstream failed and no serveable
    /// cached value exists.
    pub fn get(&self, context: &C, key: &str) -> Option<String> {
        let now = self.now();
        let cached = {
            let state = self.state.read();
            state.index.get(key).cloned()
        };
        match cached {
            Some(entry) if entry.is_fresh(now, self.soft_limit) => {
                self.state.write().stats.record_hit();
                Some(entry.value)
            }
            Some(entry) => self.refresh_present(context, key, entry, now),
            None => self.fetch_absent(context, key, now),
        }
    }

    /// Refresh path for a key that was present but stale at probe time.
    fn refresh_present(
        &self,
        context: &C,
        key: &str,
        entry: CacheEntry,
        now: Nanos,
    ) -> Option<String> {
        match (self.query)(context, key) {
            Some(fresh) => {
                let mut state = self.state.write();
                state.expire_stale(now);
                state.store(key, fresh.clone(), now);
                state.stats.record_miss();
                Some(fresh)
            }
            None if entry.is_expired(now, self.hard_limit) => {
                let mut state = self.state.write();
                state.expire_stale(now);
                state.stats.record_request_fail();
                None
            }
            None => {
                // Refresh failed but the stale value is still serveable.
                let mut state = self.state.write();
                state.expire_stale(now);
                state.stats.record_rescue();
                Some(entry.value)
            }
        }
    }

    /// Fetch path for a key that was absent at probe time.
    fn fetch_absent(&self, context: &C, key: &str, now: Nanos) -> Option<String> {
        match (self.query)(context, key) {
            Some(fresh) => {
                let mut state = self.state.write();
                state.expire_stale(now);
                // A racing writer may have populated the key meanwhile;
                // overwriting it needs no free slot.
                if state.count < self.max_count || state.index.contains_key(key) {
                    state.store(key, fresh.clone(), now);
                    state.stats.record_new_item();
                } else {
                    state.stats.record_no_room();
                }
                Some(fresh)
            }
            None => {
                self.state.write().stats.record_request_fail();
                None
            }
        }
    }

    // == Invalidate ==
    /// Removes `key` deterministically. Idempotent: invalidating an absent
    /// key is a no-op and does not count as an invalidation.
    pub fn invalidate(&self, key: &str) {
        let mut state = self.state.write();
        if let Some(entry) = state.index.remove(key) {
            state.timeline.delete_item(key, entry.created_at);
            state.count -= 1;
            state.stats.record_invalidation();
        }
        debug_assert_eq!(state.count, state.index.len());
    }

    // == Sweep ==
    /// Rotates the expiry timeline up to the current instant, reclaiming
    /// every entry past the hard limit.
    ///
    /// Lookups already do this on their own mutation paths; calling it
    /// periodically bounds memory while the cache sits idle. Returns the
    /// number of entries reclaimed.
    pub fn sweep(&self) -> usize {
        let now = self.now();
        let mut state = self.state.write();
        let before = state.count;
        state.expire_stale(now);
        before - state.count
    }

    // == Stats ==
    /// Returns a consistent snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        self.state.read().stats.clone()
    }

    /// Returns a consistent snapshot of the counters and zeroes them in
    /// the same critical section.
    pub fn get_and_reset_stats(&self) -> CacheStats {
        std::mem::take(&mut self.state.write().stats)
    }

    // == Length ==
    /// Current number of live entries.
    pub fn len(&self) -> usize {
        self.state.read().count
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread::sleep;

    const MINUTE: Duration = Duration::from_secs(60);

    /// Cache whose upstream always succeeds with a value derived from the
    /// key, counting its calls.
    fn echo_cache(
        soft: Duration,
        hard: Duration,
        max_count: usize,
    ) -> RescueCache<AtomicU64, impl Fn(&AtomicU64, &str) -> Option<String>> {
        RescueCache::new(
            |calls: &AtomicU64, key: &str| {
                calls.fetch_add(1, Ordering::Relaxed);
                Some(format!("v:{key}"))
            },
            soft,
            hard,
            max_count,
        )
        .unwrap()
    }

    #[test]
    fn test_construction_rejects_small_capacity() {
        let result =
            RescueCache::new(|_: &(), _: &str| -> Option<String> { None }, MINUTE, MINUTE, 1);
        assert!(matches!(result, Err(CacheError::CapacityTooSmall(1))));
    }

    #[test]
    fn test_construction_rejects_inverted_limits() {
        let result = RescueCache::new(
            |_: &(), _: &str| -> Option<String> { None },
            Duration::from_secs(2),
            Duration::from_secs(1),
            16,
        );
        assert!(matches!(result, Err(CacheError::LimitsInverted { .. })));
    }

    #[test]
    fn test_get_populates_and_hits() {
        let calls = AtomicU64::new(0);
        let cache = echo_cache(MINUTE, MINUTE, 16);

        assert_eq!(cache.get(&calls, "a"), Some("v:a".to_string()));
        assert_eq!(cache.get(&calls, "a"), Some("v:a".to_string()));

        // Second lookup was served without touching the upstream.
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        let stats = cache.stats();
        assert_eq!(stats.cache_new_item_count, 1);
        assert_eq!(stats.cache_hit_count, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_soft_limit_refreshes_every_lookup() {
        let calls = AtomicU64::new(0);
        let cache = echo_cache(Duration::ZERO, MINUTE, 16);

        cache.get(&calls, "a");
        cache.get(&calls, "a");
        cache.get(&calls, "a");

        assert_eq!(calls.load(Ordering::Relaxed), 3);
        let stats = cache.stats();
        assert_eq!(stats.cache_new_item_count, 1);
        assert_eq!(stats.cache_miss_count, 2);
        assert_eq!(stats.cache_hit_count, 0);
    }

    #[test]
    fn test_upstream_failure_without_fallback() {
        let cache =
            RescueCache::new(|_: &(), _: &str| -> Option<String> { None }, MINUTE, MINUTE, 16)
                .unwrap();

        assert_eq!(cache.get(&(), "a"), None);
        assert_eq!(cache.stats().cache_request_fail_count, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_empty_value_is_cached() {
        let calls = AtomicU64::new(0);
        let cache = RescueCache::new(
            |calls: &AtomicU64, _: &str| {
                calls.fetch_add(1, Ordering::Relaxed);
                Some(String::new())
            },
            MINUTE,
            MINUTE,
            16,
        )
        .unwrap();

        assert_eq!(cache.get(&calls, "a"), Some(String::new()));
        assert_eq!(cache.get(&calls, "a"), Some(String::new()));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(cache.stats().cache_hit_count, 1);
    }

    #[test]
    fn test_capacity_bound_is_enforced() {
        let calls = AtomicU64::new(0);
        let cache = echo_cache(MINUTE, MINUTE, 2);

        cache.get(&calls, "one");
        cache.get(&calls, "two");
        cache.get(&calls, "three");

        assert_eq!(cache.len(), 2);
        let stats = cache.stats();
        assert_eq!(stats.cache_new_item_count, 2);
        assert_eq!(stats.cache_no_room_count, 1);
        // The overflow lookup still reached the upstream.
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let calls = AtomicU64::new(0);
        let cache = echo_cache(MINUTE, MINUTE, 16);

        cache.get(&calls, "a");
        cache.invalidate("a");
        cache.invalidate("a");
        cache.invalidate("never-seen");

        assert_eq!(cache.stats().explicit_invalidation_count, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_reclaims_hard_expired_entries() {
        let calls = AtomicU64::new(0);
        let cache = echo_cache(Duration::from_nanos(1), Duration::from_millis(20), 16);

        cache.get(&calls, "a");
        cache.get(&calls, "b");
        assert_eq!(cache.len(), 2);

        sleep(Duration::from_millis(40));
        assert_eq!(cache.sweep(), 2);
        assert!(cache.is_empty());

        // A second sweep has nothing left to do.
        assert_eq!(cache.sweep(), 0);
    }

    #[test]
    fn test_get_and_reset_stats_zeroes_counters() {
        let calls = AtomicU64::new(0);
        let cache = echo_cache(MINUTE, MINUTE, 16);

        cache.get(&calls, "a");
        cache.get(&calls, "a");

        let snapshot = cache.get_and_reset_stats();
        assert_eq!(snapshot.cache_new_item_count, 1);
        assert_eq!(snapshot.cache_hit_count, 1);

        assert_eq!(cache.stats(), CacheStats::default());

        // Counting resumes from zero.
        cache.get(&calls, "a");
        assert_eq!(cache.stats().cache_hit_count, 1);
    }

    #[test]
    fn test_count_tracks_every_reclaim_path() {
        let calls = AtomicU64::new(0);
        let cache = echo_cache(Duration::from_nanos(1), Duration::from_millis(20), 16);

        cache.get(&calls, "a");
        cache.get(&calls, "b");
        cache.get(&calls, "c");
        cache.invalidate("b");
        assert_eq!(cache.len(), 2);

        sleep(Duration::from_millis(40));
        // The stale probe on "a" refreshes it; the expiry pass inside the
        // same lookup reclaims "c".
        assert_eq!(cache.get(&calls, "a"), Some("v:a".to_string()));
        assert_eq!(cache.len(), 1);
    }
}
