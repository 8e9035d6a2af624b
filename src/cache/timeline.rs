//! Expiry Timeline Module
//!
//! A bucketed bulk-expiry structure. Instead of scanning every entry's
//! create time, keys are filed into a fixed ring of buckets, each covering
//! one `resolution` slice of time. Expiry then means rotating the ring
//! head forward and draining whole buckets as they fall out of the window.
//!
//! Walking forward in buffer order is walking backward in time: the head
//! bucket holds the newest keys and the bucket about to rotate in under
//! the head holds the oldest.

use std::collections::HashSet;
use std::time::Duration;

use crate::cache::Nanos;

// == Expiry Timeline ==
/// Fixed-size circular buffer of key sets, addressed by bucketized time.
///
/// Keys are stored by value; the owning index never lends references into
/// the ring. All operations are synchronous and infallible: mutations that
/// address a time outside the current window are silently skipped, and
/// inserts targeting one report it by returning `false`.
#[derive(Debug)]
pub struct ExpiryTimeline {
    /// The ring. `buckets[newest_bucket]` covers `newest_time`; each step
    /// forward in the ring is one `resolution` step back in time.
    buckets: Vec<HashSet<String>>,
    /// Index of the head bucket.
    newest_bucket: usize,
    /// Bucketized timestamp currently mapped to the head bucket.
    newest_time: u64,
    /// Width of one bucket in nanoseconds.
    resolution: u64,
}

impl ExpiryTimeline {
    // == Constructor ==
    /// Creates a timeline of `bucket_count` buckets spanning `lifetime`,
    /// with the head bucket covering `now`.
    ///
    /// The resolution is `lifetime / bucket_count`, clamped to a floor of
    /// one nanosecond so degenerate lifetimes cannot divide by zero.
    ///
    /// # Panics
    /// Panics when `bucket_count` is zero.
    pub fn new(bucket_count: usize, lifetime: Duration, now: Nanos) -> Self {
        assert!(bucket_count >= 1, "timeline needs at least one bucket");
        let resolution = ((lifetime.as_nanos() as u64) / bucket_count as u64).max(1);
        Self {
            buckets: vec![HashSet::new(); bucket_count],
            newest_bucket: 0,
            newest_time: now / resolution,
            resolution,
        }
    }

    // == Addressing ==
    fn bucketize(&self, t: Nanos) -> u64 {
        t / self.resolution
    }

    /// Maps a bucketized time to its slot in the ring, or `None` when the
    /// time is newer than the head or has already rotated out.
    fn slot_for(&self, at: u64) -> Option<usize> {
        if at > self.newest_time {
            return None;
        }
        let offset = self.newest_time - at;
        if offset >= self.buckets.len() as u64 {
            return None;
        }
        Some((self.newest_bucket + offset as usize) % self.buckets.len())
    }

    // == Add Item ==
    /// Files `key` under the bucket covering `t_new`.
    ///
    /// Returns `false` when `t_new` is unaddressable; the caller must then
    /// treat the entry as untrackable for expiry.
    pub fn add_item(&mut self, key: &str, t_new: Nanos) -> bool {
        match self.slot_for(self.bucketize(t_new)) {
            Some(slot) => {
                self.buckets[slot].insert(key.to_owned());
                true
            }
            None => false,
        }
    }

    // == Replace Item ==
    /// Moves `key` from the bucket covering `t_old` (if addressable) to
    /// the bucket covering `t_new`. Returns `false` when the destination
    /// is unaddressable; the removal still happens.
    pub fn replace_item(&mut self, key: &str, t_old: Nanos, t_new: Nanos) -> bool {
        self.delete_item(key, t_old);
        self.add_item(key, t_new)
    }

    // == Delete Item ==
    /// Removes `key` from the bucket covering `t_old`; no-op when the time
    /// is unaddressable or the key was never filed there.
    pub fn delete_item(&mut self, key: &str, t_old: Nanos) {
        if let Some(slot) = self.slot_for(self.bucketize(t_old)) {
            self.buckets[slot].remove(key);
        }
    }

    // == Expire Items ==
    /// Rotates the head forward until it covers `now`, draining each bucket
    /// that falls out of the window and handing every evicted key to
    /// `invalidator`.
    ///
    /// Calls with `now` at or behind the head are no-ops; `newest_time`
    /// never decreases. An advance of at least the ring length drains every
    /// bucket, so it is collapsed into a single pass over the ring.
    pub fn expire_items(&mut self, now: Nanos, mut invalidator: impl FnMut(&str)) {
        let target = self.bucketize(now);
        if target <= self.newest_time {
            return;
        }
        if target - self.newest_time >= self.buckets.len() as u64 {
            for bucket in &mut self.buckets {
                for key in bucket.drain() {
                    invalidator(&key);
                }
            }
            self.newest_time = target;
            return;
        }
        while self.newest_time < target {
            self.newest_time += 1;
            self.newest_bucket = (self.newest_bucket + 1) % self.buckets.len();
            // The slot rotating in under the head held the oldest keys.
            let slot = self.newest_bucket;
            for key in self.buckets[slot].drain() {
                invalidator(&key);
            }
        }
    }

    // == Accessors ==
    /// Bucketized timestamp of the head bucket.
    pub fn newest_time(&self) -> u64 {
        self.newest_time
    }

    /// Total number of keys currently filed across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(HashSet::len).sum()
    }

    /// True when no bucket holds a key.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(HashSet::is_empty)
    }
}
