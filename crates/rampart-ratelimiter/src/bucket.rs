//! Per-resource admission state and the algorithm math.
//!
//! One [`Bucket`] exists per resource name. All admission decisions for a
//! bucket happen under its mutex; the critical section is a handful of
//! arithmetic operations, so the lock never outlives a few nanoseconds and
//! unrelated resources never contend (each has its own bucket).

use crate::config::{RateLimitAlgorithm, RateLimitConfig};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
enum AdmissionState {
    FixedWindow {
        window_start: Instant,
        consumed: u64,
    },
    SlidingWindow {
        window_start: Instant,
        previous: u64,
        current: u64,
    },
    TokenBucket {
        tokens: f64,
        last_refill: Instant,
    },
    LeakyBucket {
        level: f64,
        last_drain: Instant,
    },
    Concurrent {
        in_flight: u64,
    },
}

impl AdmissionState {
    fn fresh(config: &RateLimitConfig, now: Instant) -> Self {
        match config.algorithm {
            RateLimitAlgorithm::FixedWindow => AdmissionState::FixedWindow {
                window_start: now,
                consumed: 0,
            },
            RateLimitAlgorithm::SlidingWindow => AdmissionState::SlidingWindow {
                window_start: now,
                previous: 0,
                current: 0,
            },
            RateLimitAlgorithm::TokenBucket => AdmissionState::TokenBucket {
                tokens: config.max_permits as f64,
                last_refill: now,
            },
            RateLimitAlgorithm::LeakyBucket => AdmissionState::LeakyBucket {
                level: 0.0,
                last_drain: now,
            },
            RateLimitAlgorithm::Concurrent => AdmissionState::Concurrent { in_flight: 0 },
        }
    }
}

struct BucketInner {
    config: RateLimitConfig,
    state: AdmissionState,
}

/// Admission state for one resource.
pub(crate) struct Bucket {
    inner: Mutex<BucketInner>,
}

/// Refill/drain rate in permits per second.
fn rate(config: &RateLimitConfig) -> f64 {
    config.max_permits as f64 / config.window.as_secs_f64().max(f64::MIN_POSITIVE)
}

impl Bucket {
    pub(crate) fn new(config: RateLimitConfig, now: Instant) -> Self {
        Self {
            inner: Mutex::new(BucketInner {
                state: AdmissionState::fresh(&config, now),
                config,
            }),
        }
    }

    pub(crate) fn config(&self) -> RateLimitConfig {
        self.inner.lock().unwrap().config
    }

    /// Applies a new configuration. Reconfiguring with identical values is a
    /// no-op so repeated idempotent `configure` calls never reset counters;
    /// changed values start the bucket over.
    pub(crate) fn reconfigure(&self, config: RateLimitConfig, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        if inner.config == config {
            return;
        }
        inner.state = AdmissionState::fresh(&config, now);
        inner.config = config;
    }

    pub(crate) fn reset(&self, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = AdmissionState::fresh(&inner.config, now);
    }

    pub(crate) fn try_acquire(&self, permits: u64, now: Instant) -> bool {
        let inner = &mut *self.inner.lock().unwrap();
        let max = inner.config.max_permits;
        let window = inner.config.window;

        match &mut inner.state {
            AdmissionState::FixedWindow {
                window_start,
                consumed,
            } => {
                if now.duration_since(*window_start) >= window {
                    *window_start = now;
                    *consumed = 0;
                }
                if *consumed + permits <= max {
                    *consumed += permits;
                    true
                } else {
                    false
                }
            }
            AdmissionState::SlidingWindow {
                window_start,
                previous,
                current,
            } => {
                roll_sliding(window_start, previous, current, window, now);
                let into = now.duration_since(*window_start).as_secs_f64();
                let weight = 1.0 - (into / window.as_secs_f64()).min(1.0);
                let weighted = *previous as f64 * weight + *current as f64;
                if weighted + permits as f64 <= max as f64 {
                    *current += permits;
                    true
                } else {
                    false
                }
            }
            AdmissionState::TokenBucket {
                tokens,
                last_refill,
            } => {
                let refill = now.duration_since(*last_refill).as_secs_f64() * rate(&inner.config);
                *tokens = (*tokens + refill).min(max as f64);
                *last_refill = now;
                if *tokens >= permits as f64 {
                    *tokens -= permits as f64;
                    true
                } else {
                    false
                }
            }
            AdmissionState::LeakyBucket { level, last_drain } => {
                let drained = now.duration_since(*last_drain).as_secs_f64() * rate(&inner.config);
                *level = (*level - drained).max(0.0);
                *last_drain = now;
                if *level + permits as f64 <= max as f64 {
                    *level += permits as f64;
                    true
                } else {
                    false
                }
            }
            AdmissionState::Concurrent { in_flight } => {
                if *in_flight + permits <= max {
                    *in_flight += permits;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Returns permits. Only meaningful for the concurrent algorithm; the
    /// time-window algorithms ignore it.
    pub(crate) fn release(&self, permits: u64) {
        let inner = &mut *self.inner.lock().unwrap();
        if let AdmissionState::Concurrent { in_flight } = &mut inner.state {
            *in_flight = in_flight.saturating_sub(permits);
        }
    }

    pub(crate) fn available_permits(&self, now: Instant) -> u64 {
        let inner = &mut *self.inner.lock().unwrap();
        let max = inner.config.max_permits;
        let window = inner.config.window;

        match &mut inner.state {
            AdmissionState::FixedWindow {
                window_start,
                consumed,
            } => {
                if now.duration_since(*window_start) >= window {
                    *window_start = now;
                    *consumed = 0;
                }
                max.saturating_sub(*consumed)
            }
            AdmissionState::SlidingWindow {
                window_start,
                previous,
                current,
            } => {
                roll_sliding(window_start, previous, current, window, now);
                let into = now.duration_since(*window_start).as_secs_f64();
                let weight = 1.0 - (into / window.as_secs_f64()).min(1.0);
                let weighted = *previous as f64 * weight + *current as f64;
                max.saturating_sub(weighted.ceil() as u64)
            }
            AdmissionState::TokenBucket {
                tokens,
                last_refill,
            } => {
                let refill = now.duration_since(*last_refill).as_secs_f64() * rate(&inner.config);
                *tokens = (*tokens + refill).min(max as f64);
                *last_refill = now;
                tokens.floor() as u64
            }
            AdmissionState::LeakyBucket { level, last_drain } => {
                let drained = now.duration_since(*last_drain).as_secs_f64() * rate(&inner.config);
                *level = (*level - drained).max(0.0);
                *last_drain = now;
                max.saturating_sub(level.ceil() as u64)
            }
            AdmissionState::Concurrent { in_flight } => max.saturating_sub(*in_flight),
        }
    }

    /// Time until admission could next succeed for a single permit,
    /// assuming no further traffic. Zero when a permit is available now.
    pub(crate) fn reset_time(&self, now: Instant) -> Duration {
        if self.available_permits(now) > 0 {
            return Duration::ZERO;
        }
        let inner = self.inner.lock().unwrap();
        let window = inner.config.window;
        match &inner.state {
            AdmissionState::FixedWindow { window_start, .. }
            | AdmissionState::SlidingWindow { window_start, .. } => {
                window.saturating_sub(now.duration_since(*window_start))
            }
            AdmissionState::TokenBucket { tokens, .. } => {
                Duration::from_secs_f64((1.0 - tokens).max(0.0) / rate(&inner.config))
            }
            AdmissionState::LeakyBucket { level, .. } => {
                let overflow = (*level + 1.0 - inner.config.max_permits as f64).max(0.0);
                Duration::from_secs_f64(overflow / rate(&inner.config))
            }
            AdmissionState::Concurrent { .. } => Duration::ZERO,
        }
    }
}

/// Advances the two-window pair so `now` falls inside the current window.
fn roll_sliding(
    window_start: &mut Instant,
    previous: &mut u64,
    current: &mut u64,
    window: Duration,
    now: Instant,
) {
    let elapsed = now.duration_since(*window_start);
    if elapsed >= window + window {
        // Both tracked windows have fully expired.
        *window_start = now;
        *previous = 0;
        *current = 0;
    } else if elapsed >= window {
        *window_start += window;
        *previous = *current;
        *current = 0;
    }
}
