//! Rescue Cache demo
//!
//! Drives a cache against a simulated flaky upstream and reports how many
//! requests the cache kept alive through upstream failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rescue_cache::{spawn_sweeper_task, Config, RescueCache};

/// Upstream stand-in with a configurable failure rate and call latency.
struct SimulatedService {
    failure_rate: f64,
    call_latency: Duration,
    calls: AtomicU64,
    failures: AtomicU64,
}

impl SimulatedService {
    fn new(failure_rate: f64, call_latency: Duration) -> Self {
        Self {
            failure_rate,
            call_latency,
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// One simulated service call: sleep for the configured latency, then
    /// roll the failure dice.
    fn answer(&self, _question: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        thread::sleep(self.call_latency);
        let roll = rand::thread_rng().gen::<f64>();
        if roll <= self.failure_rate {
            self.failures.fetch_add(1, Ordering::Relaxed);
            None
        } else {
            Some(format!("{roll}"))
        }
    }
}

/// Demo entry point.
///
/// # Run Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load run parameters from environment variables
/// 3. Build the cache over a simulated flaky upstream
/// 4. Start the background expiry sweeper
/// 5. Hammer the cache with random keys, reporting windowed stats
/// 6. Print final statistics as JSON
fn main() {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rescue_cache=info,rescue_cache_demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "config: soft_limit={}ms hard_limit={}ms max_count={} failure_rate={} \
         call_latency={}ms requests={} key_space={}",
        config.soft_limit_ms,
        config.hard_limit_ms,
        config.max_count,
        config.failure_rate,
        config.call_latency_ms,
        config.requests,
        config.key_space
    );

    let service = SimulatedService::new(config.failure_rate, config.call_latency());
    let cache = Arc::new(
        RescueCache::new(
            |service: &SimulatedService, key: &str| service.answer(key),
            config.soft_limit(),
            config.hard_limit(),
            config.max_count,
        )
        .expect("demo configuration must be valid"),
    );

    let sweeper = spawn_sweeper_task(cache.clone(), config.sweep_interval());

    let mut caller_failures = 0u64;
    let start = Instant::now();
    let mut rng = rand::thread_rng();

    for i in 0..config.requests {
        let key = format!("order:{}", rng.gen_range(0..config.key_space));
        if cache.get(&service, &key).is_none() {
            caller_failures += 1;
        }

        if i > 0 && i % 100_000 == 0 {
            let window = cache.get_and_reset_stats();
            info!(
                completed = i,
                hit_rate = %format!("{:.3}", window.hit_rate()),
                stats = %serde_json::to_string(&window).expect("stats serialize"),
                "progress"
            );
        }
    }

    let elapsed = start.elapsed();
    sweeper.stop();

    let final_stats = cache.stats();
    info!(
        elapsed_ms = elapsed.as_millis() as u64,
        caller_failures,
        service_calls = service.calls.load(Ordering::Relaxed),
        service_failures = service.failures.load(Ordering::Relaxed),
        live_entries = cache.len(),
        "demo finished"
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&final_stats).expect("stats serialize")
    );
}
