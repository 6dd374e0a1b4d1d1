//! Per-resource circuit breaking.
//!
//! A [`CircuitBreaker`] is a registry of breaker state machines keyed by
//! resource name. Each breaker moves between three states:
//!
//! - **Closed**: calls permitted, outcomes counted. Once at least
//!   `request_volume_threshold` outcomes are recorded and the failure ratio
//!   reaches `failure_ratio`, the breaker opens.
//! - **Open**: calls rejected without running user code. After
//!   `open_duration` the next admission attempt moves it to half-open.
//! - **Half-open**: up to `success_threshold` trial calls are admitted.
//!   That many successes close the breaker; any failure reopens it and
//!   restarts the delay.
//!
//! Rejections while open are counted separately from execution failures so
//! operators can tell "the dependency is down" apart from "we are shedding
//! load".
//!
//! ```
//! use rampart_circuitbreaker::{BreakerConfig, BreakerState, CircuitBreaker};
//!
//! let breaker = CircuitBreaker::new();
//! breaker.configure("db", BreakerConfig::builder().failure_ratio(0.5).build());
//!
//! assert!(breaker.is_call_permitted("db"));
//! breaker.record_success("db");
//! assert_eq!(breaker.state("db"), BreakerState::Closed);
//! ```

mod breaker;
mod config;
mod events;

pub use breaker::{BreakerMetrics, BreakerState};
pub use config::{BreakerConfig, BreakerConfigBuilder};
pub use events::CircuitBreakerEvent;

use breaker::Breaker;
use dashmap::DashMap;
use rampart_core::{Clock, EventListener, EventListeners, FnListener, SystemClock};
use std::sync::Arc;

/// Registry of breakers keyed by resource name.
pub struct CircuitBreaker {
    breakers: DashMap<String, Arc<Breaker>>,
    default_config: BreakerConfig,
    clock: Arc<dyn Clock>,
    listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreaker {
    /// Creates a registry using the system clock and default thresholds for
    /// unconfigured resources.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a registry reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config: BreakerConfig::default(),
            clock,
            listeners: EventListeners::new(),
        }
    }

    /// Sets the thresholds applied to resources used before being
    /// explicitly configured.
    pub fn default_config(mut self, config: BreakerConfig) -> Self {
        self.default_config = config;
        self
    }

    /// Adds an event listener. Call before sharing the registry.
    pub fn subscribe<L>(&mut self, listener: L)
    where
        L: EventListener<CircuitBreakerEvent> + 'static,
    {
        self.listeners.add(listener);
    }

    /// Registers a callback invoked on every state transition.
    pub fn on_state_transition<F>(&mut self, f: F)
    where
        F: Fn(&str, BreakerState, BreakerState) + Send + Sync + 'static,
    {
        self.listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                resource, from, to, ..
            } = event
            {
                f(resource, *from, *to);
            }
        }));
    }

    /// Applies `config` to `resource`.
    ///
    /// Idempotent: reconfiguring with identical values keeps the existing
    /// breaker and its counters. Changed values replace the breaker with a
    /// fresh closed one.
    pub fn configure(&self, resource: &str, config: BreakerConfig) {
        let now = self.clock.now();
        match self.breakers.entry(resource.to_string()) {
            dashmap::Entry::Occupied(mut entry) => {
                if entry.get().config() != config {
                    entry.insert(Arc::new(Breaker::new(config, now)));
                }
            }
            dashmap::Entry::Vacant(entry) => {
                entry.insert(Arc::new(Breaker::new(config, now)));
            }
        }
    }

    /// Whether a call to `resource` may proceed right now.
    ///
    /// An open breaker past its delay flips to half-open as a side effect.
    pub fn is_call_permitted(&self, resource: &str) -> bool {
        let now = self.clock.now();
        self.breaker(resource)
            .try_acquire(now, resource, &self.listeners)
    }

    /// Records a successful final outcome for `resource`.
    pub fn record_success(&self, resource: &str) {
        let now = self.clock.now();
        self.breaker(resource)
            .record_success(now, resource, &self.listeners);
    }

    /// Records a failed final outcome for `resource`.
    pub fn record_failure(&self, resource: &str) {
        let now = self.clock.now();
        self.breaker(resource)
            .record_failure(now, resource, &self.listeners);
    }

    /// Current state of `resource`'s breaker (creating it closed if it has
    /// never been seen).
    pub fn state(&self, resource: &str) -> BreakerState {
        self.breaker(resource).state()
    }

    /// Snapshot of `resource`'s breaker, or `None` if it has never been
    /// seen.
    pub fn metrics(&self, resource: &str) -> Option<BreakerMetrics> {
        let now = self.clock.now();
        self.breakers.get(resource).map(|b| b.metrics(now))
    }

    /// State of every known breaker, for dashboards.
    pub fn all_states(&self) -> Vec<(String, BreakerState)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }

    /// Forces `resource`'s breaker open (admin operation).
    pub fn force_open(&self, resource: &str) {
        let now = self.clock.now();
        self.breaker(resource)
            .force(BreakerState::Open, now, resource, &self.listeners);
    }

    /// Forces `resource`'s breaker closed (admin operation).
    pub fn force_close(&self, resource: &str) {
        let now = self.clock.now();
        self.breaker(resource)
            .force(BreakerState::Closed, now, resource, &self.listeners);
    }

    /// Returns `resource`'s breaker to a pristine closed state, clearing
    /// the rejection counter too.
    pub fn reset(&self, resource: &str) {
        let now = self.clock.now();
        if let Some(breaker) = self.breakers.get(resource) {
            breaker.force(BreakerState::Closed, now, resource, &self.listeners);
            breaker.clear_rejected();
        }
    }

    /// Drops `resource`'s breaker entirely.
    pub fn remove(&self, resource: &str) {
        self.breakers.remove(resource);
    }

    /// Drops every breaker. Administrative/test use.
    pub fn reset_all(&self) {
        self.breakers.clear();
    }

    fn breaker(&self, resource: &str) -> Arc<Breaker> {
        if let Some(breaker) = self.breakers.get(resource) {
            return Arc::clone(&breaker);
        }
        let now = self.clock.now();
        Arc::clone(
            self.breakers
                .entry(resource.to_string())
                .or_insert_with(|| Arc::new(Breaker::new(self.default_config, now)))
                .value(),
        )
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
