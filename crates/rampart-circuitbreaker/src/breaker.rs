//! The per-resource breaker state machine.
//!
//! `state` is an `AtomicU8` and every transition is a single
//! `compare_exchange`, so exactly one thread wins each transition and owns
//! the bookkeeping (timestamps, counter resets). Outcome counters are plain
//! atomics and may lag slightly under contention; the state itself never
//! does.

use crate::config::BreakerConfig;
use crate::events::CircuitBreakerEvent;
use rampart_core::EventListeners;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// State of one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BreakerState {
    /// Calls permitted; outcomes counted.
    Closed = 0,
    /// Calls rejected without running.
    Open = 1,
    /// A bounded number of trial calls permitted.
    HalfOpen = 2,
}

impl BreakerState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => BreakerState::Open,
            2 => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }

    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time snapshot of one breaker, for dashboards and health checks.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerMetrics {
    /// Current state.
    pub state: BreakerState,
    /// Successes recorded since the last transition.
    pub success_count: u64,
    /// Failures recorded since the last transition.
    pub failure_count: u64,
    /// Calls rejected while open or while half-open trials were exhausted.
    /// Cumulative until [`reset`](crate::CircuitBreaker::reset); kept apart
    /// from `failure_count` so shed load is distinguishable from a failing
    /// dependency.
    pub rejected_count: u64,
    /// `failure_count / (success_count + failure_count)`, 0.0 when empty.
    pub failure_rate: f64,
    /// Time since the last state transition.
    pub time_since_state_change: Duration,
    /// Time since the last recorded failure, or `None` if none has been
    /// recorded since the breaker was created or last reset.
    pub time_since_last_failure: Option<Duration>,
}

#[derive(Debug)]
struct Timestamps {
    state_changed_at: Instant,
    opened_at: Instant,
    last_failure_at: Option<Instant>,
}

pub(crate) struct Breaker {
    config: BreakerConfig,
    state: AtomicU8,
    success: AtomicU64,
    failure: AtomicU64,
    rejected: AtomicU64,
    half_open_admitted: AtomicU64,
    half_open_successes: AtomicU64,
    // Written only by the single winner of each transition.
    timestamps: Mutex<Timestamps>,
}

impl Breaker {
    pub(crate) fn new(config: BreakerConfig, now: Instant) -> Self {
        Self {
            config,
            state: AtomicU8::new(BreakerState::Closed as u8),
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            half_open_admitted: AtomicU64::new(0),
            half_open_successes: AtomicU64::new(0),
            timestamps: Mutex::new(Timestamps {
                state_changed_at: now,
                opened_at: now,
                last_failure_at: None,
            }),
        }
    }

    pub(crate) fn config(&self) -> BreakerConfig {
        self.config
    }

    pub(crate) fn state(&self) -> BreakerState {
        BreakerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn try_acquire(
        &self,
        now: Instant,
        resource: &str,
        listeners: &EventListeners<CircuitBreakerEvent>,
    ) -> bool {
        let state = self.state();
        let permitted = match state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let opened_at = self.timestamps.lock().unwrap().opened_at;
                if now.duration_since(opened_at) >= self.config.open_duration {
                    // Winner or not, the breaker is now probing; admission is
                    // decided by the half-open trial budget either way.
                    self.transition(BreakerState::Open, BreakerState::HalfOpen, now, resource, listeners);
                    self.admit_trial()
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => self.admit_trial(),
        };

        if permitted {
            listeners.emit(&CircuitBreakerEvent::CallPermitted {
                resource: resource.to_string(),
                timestamp: Instant::now(),
                state,
            });
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            listeners.emit(&CircuitBreakerEvent::CallRejected {
                resource: resource.to_string(),
                timestamp: Instant::now(),
            });

            #[cfg(feature = "metrics")]
            counter!("circuitbreaker_rejections_total", "resource" => resource.to_string())
                .increment(1);
        }
        permitted
    }

    /// Claims one half-open trial slot; at most `success_threshold` trials
    /// run before the breaker decides.
    fn admit_trial(&self) -> bool {
        self.half_open_admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.config.success_threshold).then_some(n + 1)
            })
            .is_ok()
    }

    pub(crate) fn record_success(
        &self,
        now: Instant,
        resource: &str,
        listeners: &EventListeners<CircuitBreakerEvent>,
    ) {
        listeners.emit(&CircuitBreakerEvent::SuccessRecorded {
            resource: resource.to_string(),
            timestamp: Instant::now(),
        });

        match self.state() {
            BreakerState::HalfOpen => {
                let successes = self.half_open_successes.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.config.success_threshold {
                    self.transition(BreakerState::HalfOpen, BreakerState::Closed, now, resource, listeners);
                }
            }
            BreakerState::Closed => {
                self.success.fetch_add(1, Ordering::Relaxed);
                self.evaluate(now, resource, listeners);
            }
            // A call admitted before the breaker opened may complete late;
            // its outcome no longer matters.
            BreakerState::Open => {}
        }
    }

    pub(crate) fn record_failure(
        &self,
        now: Instant,
        resource: &str,
        listeners: &EventListeners<CircuitBreakerEvent>,
    ) {
        self.timestamps.lock().unwrap().last_failure_at = Some(now);
        listeners.emit(&CircuitBreakerEvent::FailureRecorded {
            resource: resource.to_string(),
            timestamp: Instant::now(),
        });

        match self.state() {
            BreakerState::HalfOpen => {
                // Any half-open failure reopens. The CAS means two
                // concurrent failures produce one transition and one
                // opened_at write.
                self.transition(BreakerState::HalfOpen, BreakerState::Open, now, resource, listeners);
            }
            BreakerState::Closed => {
                self.failure.fetch_add(1, Ordering::Relaxed);
                self.evaluate(now, resource, listeners);
            }
            BreakerState::Open => {}
        }
    }

    /// Opens the breaker if the ratio threshold is met over enough volume.
    fn evaluate(
        &self,
        now: Instant,
        resource: &str,
        listeners: &EventListeners<CircuitBreakerEvent>,
    ) {
        let failures = self.failure.load(Ordering::Relaxed);
        let total = failures + self.success.load(Ordering::Relaxed);
        if total < self.config.request_volume_threshold.max(1) {
            return;
        }
        if failures as f64 / total as f64 >= self.config.failure_ratio {
            self.transition(BreakerState::Closed, BreakerState::Open, now, resource, listeners);
        }
    }

    /// Single-winner CAS transition. Returns whether this caller won.
    fn transition(
        &self,
        from: BreakerState,
        to: BreakerState,
        now: Instant,
        resource: &str,
        listeners: &EventListeners<CircuitBreakerEvent>,
    ) -> bool {
        if self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.after_transition(from, to, now, resource, listeners);
        true
    }

    /// Forces the state to `to` regardless of the current state.
    pub(crate) fn force(
        &self,
        to: BreakerState,
        now: Instant,
        resource: &str,
        listeners: &EventListeners<CircuitBreakerEvent>,
    ) {
        let old = BreakerState::from_u8(self.state.swap(to as u8, Ordering::AcqRel));
        if old != to {
            self.after_transition(old, to, now, resource, listeners);
        }
    }

    pub(crate) fn clear_rejected(&self) {
        self.rejected.store(0, Ordering::Relaxed);
        self.timestamps.lock().unwrap().last_failure_at = None;
    }

    fn after_transition(
        &self,
        from: BreakerState,
        to: BreakerState,
        now: Instant,
        resource: &str,
        listeners: &EventListeners<CircuitBreakerEvent>,
    ) {
        {
            let mut ts = self.timestamps.lock().unwrap();
            ts.state_changed_at = now;
            if to == BreakerState::Open {
                ts.opened_at = now;
            }
        }
        self.success.store(0, Ordering::Relaxed);
        self.failure.store(0, Ordering::Relaxed);
        self.half_open_admitted.store(0, Ordering::Relaxed);
        self.half_open_successes.store(0, Ordering::Relaxed);

        #[cfg(feature = "tracing")]
        tracing::info!(
            resource,
            from = from.as_str(),
            to = to.as_str(),
            "circuit breaker state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "resource" => resource.to_string(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "resource" => resource.to_string())
                .set(to as u8 as f64);
        }

        listeners.emit(&CircuitBreakerEvent::StateTransition {
            resource: resource.to_string(),
            timestamp: Instant::now(),
            from,
            to,
        });
    }

    pub(crate) fn metrics(&self, now: Instant) -> BreakerMetrics {
        let success_count = self.success.load(Ordering::Relaxed);
        let failure_count = self.failure.load(Ordering::Relaxed);
        let total = success_count + failure_count;
        let failure_rate = if total > 0 {
            failure_count as f64 / total as f64
        } else {
            0.0
        };
        let (state_changed_at, last_failure_at) = {
            let ts = self.timestamps.lock().unwrap();
            (ts.state_changed_at, ts.last_failure_at)
        };

        BreakerMetrics {
            state: self.state(),
            success_count,
            failure_count,
            rejected_count: self.rejected.load(Ordering::Relaxed),
            failure_rate,
            time_since_state_change: now.saturating_duration_since(state_changed_at),
            time_since_last_failure: last_failure_at
                .map(|at| now.saturating_duration_since(at)),
        }
    }
}
