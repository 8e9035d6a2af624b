//! Expiry Sweep Task
//!
//! Background thread that periodically rotates the cache's expiry
//! timeline so hard-expired entries are reclaimed even while no lookups
//! arrive.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::RescueCache;

// == Sweeper Handle ==
/// Handle to a running sweeper thread.
///
/// Call [`stop`](SweeperHandle::stop) for an orderly shutdown; dropping
/// the handle also signals the thread to exit without waiting for it.
pub struct SweeperHandle {
    stop: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Signals the sweeper to stop and waits for the thread to exit.
    pub fn stop(mut self) {
        let _ = self.stop.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// True once the sweeper thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true)
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(());
    }
}

/// Spawns a background thread that calls [`RescueCache::sweep`] every
/// `interval`.
///
/// Lookups already expire stale buckets on their own mutation paths; the
/// sweeper bounds memory when the cache sits idle.
///
/// # Arguments
/// * `cache` - shared cache to sweep
/// * `interval` - pause between sweep runs
///
/// # Returns
/// A [`SweeperHandle`] used to stop the thread during shutdown.
pub fn spawn_sweeper_task<C, F>(
    cache: Arc<RescueCache<C, F>>,
    interval: Duration,
) -> SweeperHandle
where
    C: 'static,
    F: Fn(&C, &str) -> Option<String> + Send + Sync + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel();

    let thread = thread::spawn(move || {
        info!(interval_ms = interval.as_millis() as u64, "expiry sweeper started");

        loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let removed = cache.sweep();
                    if removed > 0 {
                        info!(removed, "expiry sweep reclaimed entries");
                    } else {
                        debug!("expiry sweep found nothing to reclaim");
                    }
                }
                // Stop signal, or every handle dropped.
                _ => break,
            }
        }

        info!("expiry sweeper stopped");
    });

    SweeperHandle {
        stop: stop_tx,
        thread: Some(thread),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread::sleep;

    fn counting_cache(
        hard: Duration,
    ) -> Arc<RescueCache<AtomicU64, impl Fn(&AtomicU64, &str) -> Option<String>>> {
        Arc::new(
            RescueCache::new(
                |calls: &AtomicU64, key: &str| {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Some(key.to_owned())
                },
                Duration::from_nanos(1),
                hard,
                64,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_sweeper_reclaims_expired_entries() {
        let calls = AtomicU64::new(0);
        let cache = counting_cache(Duration::from_millis(30));

        cache.get(&calls, "expire-soon");
        assert_eq!(cache.len(), 1);

        let handle = spawn_sweeper_task(cache.clone(), Duration::from_millis(10));

        // Entry outlives the hard limit with no further lookups; only the
        // sweeper can reclaim it.
        sleep(Duration::from_millis(120));
        assert!(cache.is_empty(), "sweeper should have reclaimed the entry");

        handle.stop();
    }

    #[test]
    fn test_sweeper_preserves_live_entries() {
        let calls = AtomicU64::new(0);
        let cache = counting_cache(Duration::from_secs(3600));

        cache.get(&calls, "long-lived");

        let handle = spawn_sweeper_task(cache.clone(), Duration::from_millis(10));
        sleep(Duration::from_millis(60));

        assert_eq!(cache.len(), 1);
        handle.stop();
    }

    #[test]
    fn test_sweeper_stops_on_request() {
        let cache = counting_cache(Duration::from_secs(3600));

        let handle = spawn_sweeper_task(cache, Duration::from_millis(10));
        assert!(!handle.is_finished());
        handle.stop();
    }

    #[test]
    fn test_dropping_handle_signals_stop() {
        let cache = counting_cache(Duration::from_secs(3600));

        let handle = spawn_sweeper_task(cache, Duration::from_millis(10));
        drop(handle);

        // The thread notices the closed channel on its next wakeup.
        sleep(Duration::from_millis(60));
    }
}
