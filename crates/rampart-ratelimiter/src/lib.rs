//! Per-resource admission rate limiting.
//!
//! A [`RateLimiter`] is a registry of admission buckets keyed by resource
//! name. Buckets are created lazily on first use and live until explicitly
//! removed, so every caller naming the same resource shares the same state.
//!
//! Five algorithms are selectable per resource
//! ([`RateLimitAlgorithm`]): fixed window, weighted sliding window (the
//! default), token bucket, leaky bucket, and a concurrent in-flight cap.
//!
//! The limiter never returns an error: `false` / `None` means "try again
//! later" and callers decide whether that is fatal.
//!
//! ```
//! use rampart_ratelimiter::{RateLimiter, RateLimitConfig};
//! use std::time::Duration;
//!
//! let limiter = RateLimiter::new();
//! limiter.configure("search", RateLimitConfig::per_window(5, Duration::from_secs(1)));
//!
//! assert!(limiter.try_acquire("search"));
//! ```

mod bucket;
mod config;
mod events;

pub use config::{RateLimitAlgorithm, RateLimitConfig, RateLimitConfigBuilder};
pub use events::RateLimiterEvent;

use bucket::Bucket;
use dashmap::DashMap;
use rampart_core::{Clock, EventListener, EventListeners, FnListener, SystemClock};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::counter;

/// How often a blocking [`acquire`](RateLimiter::acquire) re-polls the bucket.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Registry of admission buckets keyed by resource name.
pub struct RateLimiter {
    buckets: DashMap<String, Arc<Bucket>>,
    default_config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    listeners: EventListeners<RateLimiterEvent>,
}

impl RateLimiter {
    /// Creates a limiter with the default configuration for unconfigured
    /// resources and the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a limiter reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            default_config: RateLimitConfig::default(),
            clock,
            listeners: EventListeners::new(),
        }
    }

    /// Sets the configuration applied to resources that are used before
    /// being explicitly configured.
    pub fn default_config(mut self, config: RateLimitConfig) -> Self {
        self.default_config = config;
        self
    }

    /// Adds an event listener. Call before sharing the limiter.
    pub fn subscribe<L>(&mut self, listener: L)
    where
        L: EventListener<RateLimiterEvent> + 'static,
    {
        self.listeners.add(listener);
    }

    /// Registers a callback invoked whenever admission is refused.
    pub fn on_permits_rejected<F>(&mut self, f: F)
    where
        F: Fn(&str, u64) + Send + Sync + 'static,
    {
        self.listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitsRejected {
                resource, permits, ..
            } = event
            {
                f(resource, *permits);
            }
        }));
    }

    /// Applies `config` to `resource`.
    ///
    /// Idempotent: reconfiguring with identical values leaves the bucket's
    /// counters untouched; changed values start the bucket over.
    pub fn configure(&self, resource: &str, config: RateLimitConfig) {
        let now = self.clock.now();
        match self.buckets.entry(resource.to_string()) {
            dashmap::Entry::Occupied(entry) => entry.get().reconfigure(config, now),
            dashmap::Entry::Vacant(entry) => {
                entry.insert(Arc::new(Bucket::new(config, now)));
            }
        }
    }

    /// Non-blocking single-permit acquire.
    pub fn try_acquire(&self, resource: &str) -> bool {
        self.try_acquire_many(resource, 1)
    }

    /// Non-blocking multi-permit acquire.
    pub fn try_acquire_many(&self, resource: &str, permits: u64) -> bool {
        let now = self.clock.now();
        let granted = self.bucket(resource).try_acquire(permits, now);

        if granted {
            self.listeners.emit(&RateLimiterEvent::PermitsGranted {
                resource: resource.to_string(),
                timestamp: Instant::now(),
                permits,
            });
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!(resource, permits, "rate limiter refused admission");

            self.listeners.emit(&RateLimiterEvent::PermitsRejected {
                resource: resource.to_string(),
                timestamp: Instant::now(),
                permits,
            });
        }

        #[cfg(feature = "metrics")]
        counter!(
            "ratelimiter_decisions_total",
            "resource" => resource.to_string(),
            "outcome" => if granted { "granted" } else { "rejected" }
        )
        .increment(1);

        granted
    }

    /// Waits until `permits` can be acquired, re-polling every 10 ms.
    ///
    /// Suspends cooperatively; dropping the future before it resolves
    /// consumes nothing.
    pub async fn acquire_many(&self, resource: &str, permits: u64) {
        loop {
            if self.try_acquire_many(resource, permits) {
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Waits until a single permit can be acquired.
    pub async fn acquire(&self, resource: &str) {
        self.acquire_many(resource, 1).await;
    }

    /// Waits up to `timeout` for a single permit. Returns whether one was
    /// granted.
    pub async fn acquire_timeout(&self, resource: &str, timeout: Duration) -> bool {
        self.acquire_many_timeout(resource, 1, timeout).await
    }

    /// Waits up to `timeout` for `permits` permits. Returns whether they
    /// were granted.
    pub async fn acquire_many_timeout(
        &self,
        resource: &str,
        permits: u64,
        timeout: Duration,
    ) -> bool {
        tokio::time::timeout(timeout, self.acquire_many(resource, permits))
            .await
            .is_ok()
    }

    /// Returns a permit taken with [`RateLimitAlgorithm::Concurrent`].
    /// A no-op for the time-window algorithms.
    pub fn release(&self, resource: &str) {
        self.release_many(resource, 1);
    }

    /// Returns `permits` permits to a concurrent limiter.
    pub fn release_many(&self, resource: &str, permits: u64) {
        if let Some(bucket) = self.buckets.get(resource) {
            bucket.release(permits);
        }
    }

    /// Permits currently available, or `None` if the resource has never
    /// been seen.
    pub fn available_permits(&self, resource: &str) -> Option<u64> {
        let now = self.clock.now();
        self.buckets.get(resource).map(|b| b.available_permits(now))
    }

    /// Milliseconds until admission could next succeed, or `None` if the
    /// resource has never been seen.
    pub fn reset_time_ms(&self, resource: &str) -> Option<u64> {
        let now = self.clock.now();
        self.buckets
            .get(resource)
            .map(|b| b.reset_time(now).as_millis() as u64)
    }

    /// The effective configuration for `resource`, if it exists.
    pub fn config_of(&self, resource: &str) -> Option<RateLimitConfig> {
        self.buckets.get(resource).map(|b| b.config())
    }

    /// Names of every resource with a live bucket.
    pub fn resources(&self) -> Vec<String> {
        self.buckets.iter().map(|e| e.key().clone()).collect()
    }

    /// Clears `resource`'s counters without touching its configuration.
    pub fn reset(&self, resource: &str) {
        let now = self.clock.now();
        if let Some(bucket) = self.buckets.get(resource) {
            bucket.reset(now);
        }
    }

    /// Drops `resource`'s bucket entirely.
    pub fn remove(&self, resource: &str) {
        self.buckets.remove(resource);
    }

    /// Drops every bucket. Administrative/test use.
    pub fn reset_all(&self) {
        self.buckets.clear();
    }

    fn bucket(&self, resource: &str) -> Arc<Bucket> {
        if let Some(bucket) = self.buckets.get(resource) {
            return Arc::clone(&bucket);
        }
        // compute-if-absent: the entry API makes concurrent first use of the
        // same name converge on a single bucket.
        let now = self.clock.now();
        Arc::clone(
            self.buckets
                .entry(resource.to_string())
                .or_insert_with(|| Arc::new(Bucket::new(self.default_config, now)))
                .value(),
        )
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
