//! Composed protection pipelines.
//!
//! [`Resilience`] owns one registry per pattern (rate limiter, circuit
//! breaker, bulkhead, retry, degradation, fallback) and wires them around a
//! caller-supplied async operation. Each stage is also exposed on its own
//! (`execute_with_*`), so callers can compose a custom pipeline, while
//! [`protect`](Resilience::protect) applies the per-resource
//! [`ProtectionConfig`]:
//!
//! - [`ProtectionLevel::Full`]: rate limiter, circuit breaker, degradation
//!   check, bulkhead, then retry under an overall timeout. The breaker
//!   observes the final outcome of the whole retry sequence, never the
//!   individual attempts.
//! - [`ProtectionLevel::Standard`]: circuit breaker and retry.
//! - [`ProtectionLevel::Light`]: circuit breaker only.
//!
//! Every level finishes the same way: a success is recorded in the fallback
//! cache, and any error is offered to the [`FallbackRegistry`] before it
//! reaches the caller.
//!
//! ```
//! use rampart_pipeline::Resilience;
//!
//! # async fn example() {
//! let resilience = Resilience::new();
//! let result: Result<u32, _> = resilience
//!     .protect("inventory", || async { Ok::<_, String>(3) })
//!     .await;
//! assert_eq!(result.unwrap(), 3);
//! # }
//! ```

mod config;

pub use config::{ProtectionConfig, ProtectionConfigBuilder, ProtectionLevel};
pub use rampart_bulkhead::{Bulkhead, BulkheadConfig, BulkheadError, BulkheadPermit};
pub use rampart_circuitbreaker::{BreakerConfig, BreakerMetrics, BreakerState, CircuitBreaker};
pub use rampart_core::{Clock, GuardError, ManualClock, SystemClock};
pub use rampart_degradation::DegradationRegistry;
pub use rampart_fallback::{FallbackKind, FallbackRegistry, FallbackStrategy};
pub use rampart_ratelimiter::{RateLimitAlgorithm, RateLimitConfig, RateLimiter};
pub use rampart_retry::{BackoffStrategy, RetryExecutor, RetryRule};

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use metrics::counter;

/// The six pattern registries plus per-resource protection levels.
pub struct Resilience {
    rate_limiter: RateLimiter,
    circuit_breaker: CircuitBreaker,
    bulkhead: Bulkhead,
    retry: RetryExecutor,
    degradation: DegradationRegistry,
    fallbacks: FallbackRegistry,
    protections: DashMap<String, ProtectionConfig>,
    default_protection: ProtectionConfig,
}

impl Resilience {
    /// Creates a facade with every registry at its defaults, reading the
    /// system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a facade whose time-based stages (rate limiter, circuit
    /// breaker) read `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            rate_limiter: RateLimiter::with_clock(Arc::clone(&clock)),
            circuit_breaker: CircuitBreaker::with_clock(clock),
            bulkhead: Bulkhead::new(),
            retry: RetryExecutor::new(),
            degradation: DegradationRegistry::new(),
            fallbacks: FallbackRegistry::new(),
            protections: DashMap::new(),
            default_protection: ProtectionConfig::default(),
        }
    }

    /// Sets the protection applied to resources used before being
    /// explicitly configured.
    pub fn default_protection(mut self, config: ProtectionConfig) -> Self {
        self.default_protection = config;
        self
    }

    // Stage registries, for direct use and for subscribing listeners before
    // the facade is shared.

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn rate_limiter_mut(&mut self) -> &mut RateLimiter {
        &mut self.rate_limiter
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub fn circuit_breaker_mut(&mut self) -> &mut CircuitBreaker {
        &mut self.circuit_breaker
    }

    pub fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }

    pub fn bulkhead_mut(&mut self) -> &mut Bulkhead {
        &mut self.bulkhead
    }

    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    pub fn retry_mut(&mut self) -> &mut RetryExecutor {
        &mut self.retry
    }

    pub fn degradation(&self) -> &DegradationRegistry {
        &self.degradation
    }

    pub fn fallbacks(&self) -> &FallbackRegistry {
        &self.fallbacks
    }

    // Configuration passthroughs.

    pub fn configure_rate_limit(&self, resource: &str, config: RateLimitConfig) {
        self.rate_limiter.configure(resource, config);
    }

    pub fn configure_circuit_breaker(&self, resource: &str, config: BreakerConfig) {
        self.circuit_breaker.configure(resource, config);
    }

    pub fn configure_bulkhead(&self, resource: &str, config: BulkheadConfig) {
        self.bulkhead.configure(resource, config);
    }

    pub fn configure_retry(&self, resource: &str, rule: RetryRule) {
        self.retry.configure(resource, rule);
    }

    /// Sets `resource`'s protection level and timeout budget.
    pub fn configure_protection(&self, resource: &str, config: ProtectionConfig) {
        self.protections.insert(resource.to_string(), config);
    }

    /// The effective protection for `resource`.
    pub fn protection_of(&self, resource: &str) -> ProtectionConfig {
        self.protections
            .get(resource)
            .map(|c| *c)
            .unwrap_or(self.default_protection)
    }

    pub fn register_fallback<T, E>(&self, resource: &str, strategy: FallbackStrategy<T, E>)
    where
        T: Clone + Send + Sync + 'static,
        E: 'static,
    {
        self.fallbacks.register(resource, strategy);
    }

    pub fn register_degraded_implementation<T, F>(&self, resource: &str, supplier: F)
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.degradation.register_degraded_implementation(resource, supplier);
    }

    // Single-stage wrappers.

    /// Runs `op` if the rate limiter admits the call.
    pub async fn execute_with_rate_limit<T, E, F, Fut>(
        &self,
        resource: &str,
        op: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.check_rate_limit(resource)?;
        op().await.map_err(GuardError::Operation)
    }

    /// Runs `op` under the circuit breaker, recording its outcome.
    pub async fn execute_with_circuit_breaker<T, E, F, Fut>(
        &self,
        resource: &str,
        op: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.check_circuit(resource)?;
        let result = op().await;
        self.record_outcome(resource, result.is_ok());
        result.map_err(GuardError::Operation)
    }

    /// Runs `op` inside the resource's bulkhead.
    pub async fn execute_with_bulkhead<T, E, F, Fut>(
        &self,
        resource: &str,
        op: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.bulkhead.execute(resource, op).await
    }

    /// Runs `op` under the resource's retry rule, treating every error as
    /// retryable.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        resource: &str,
        op: F,
    ) -> Result<T, GuardError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.retry.execute(resource, op).await
    }

    /// Runs `op` under the resource's retry rule, retrying only errors for
    /// which `retryable` returns true.
    pub async fn execute_with_retry_if<T, E, F, Fut, P>(
        &self,
        resource: &str,
        op: F,
        retryable: P,
    ) -> Result<T, GuardError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        self.retry.execute_with_condition(resource, op, retryable).await
    }

    /// Runs `op` with an overall time budget.
    pub async fn execute_with_timeout<T, E, F, Fut>(
        &self,
        resource: &str,
        budget: Duration,
        op: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(budget, op()).await {
            Ok(result) => result.map_err(GuardError::Operation),
            Err(_) => Err(GuardError::Timeout {
                resource: resource.to_string(),
                budget,
            }),
        }
    }

    /// Runs `op`; on failure resolves the resource's fallback strategy, on
    /// success feeds the fallback cache.
    pub async fn execute_with_fallback<T, E, F, Fut>(
        &self,
        resource: &str,
        op: F,
    ) -> Result<T, GuardError<E>>
    where
        T: Clone + Default + Send + Sync + 'static,
        E: 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match op().await {
            Ok(value) => {
                self.fallbacks.record_success(resource, &value);
                Ok(value)
            }
            Err(e) => self
                .fallbacks
                .resolve(resource, GuardError::Operation(e), &self.degradation),
        }
    }

    /// Runs `op` behind the resource's configured protection pipeline.
    ///
    /// Whatever the level, a success is recorded in the fallback cache and
    /// an error is offered to the fallback registry before propagating.
    pub async fn protect<T, E, F, Fut>(&self, resource: &str, op: F) -> Result<T, GuardError<E>>
    where
        T: Clone + Default + Send + Sync + 'static,
        E: 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let config = self.protection_of(resource);
        let outcome = match config.level {
            ProtectionLevel::Full => self.run_full(resource, config, &op).await,
            ProtectionLevel::Standard => self.run_standard(resource, &op).await,
            ProtectionLevel::Light => self.run_light(resource, &op).await,
        };

        #[cfg(feature = "metrics")]
        counter!(
            "resilience_calls_total",
            "resource" => resource.to_string(),
            "outcome" => if outcome.is_ok() { "success" } else { "failure" }
        )
        .increment(1);

        match outcome {
            Ok(value) => {
                self.fallbacks.record_success(resource, &value);
                Ok(value)
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(resource, stage = err.stage(), "call failed, consulting fallback");
                self.fallbacks.resolve(resource, err, &self.degradation)
            }
        }
    }

    async fn run_full<T, E, F, Fut>(
        &self,
        resource: &str,
        config: ProtectionConfig,
        op: &F,
    ) -> Result<T, GuardError<E>>
    where
        T: Default + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.check_rate_limit(resource)?;
        self.check_circuit(resource)?;

        // Degradation pre-empts execution entirely; the breaker records
        // nothing because no call was made.
        if self.degradation.is_degraded(resource) {
            return Ok(self.degradation.degraded_value(resource).unwrap_or_default());
        }

        let _permit = self.bulkhead.try_enter(resource).await?;

        let attempts = self.retry.execute(resource, op);
        let outcome = match config.timeout {
            Some(budget) => match tokio::time::timeout(budget, attempts).await {
                Ok(result) => result,
                Err(_) => Err(GuardError::Timeout {
                    resource: resource.to_string(),
                    budget,
                }),
            },
            None => attempts.await,
        };

        // The breaker sees one outcome per pipeline invocation, not one per
        // retry attempt.
        self.record_outcome(resource, outcome.is_ok());
        outcome
    }

    async fn run_standard<T, E, F, Fut>(&self, resource: &str, op: &F) -> Result<T, GuardError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.check_circuit(resource)?;
        let outcome = self.retry.execute(resource, op).await;
        self.record_outcome(resource, outcome.is_ok());
        outcome
    }

    async fn run_light<T, E, F, Fut>(&self, resource: &str, op: &F) -> Result<T, GuardError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.check_circuit(resource)?;
        let outcome = op().await;
        self.record_outcome(resource, outcome.is_ok());
        outcome.map_err(GuardError::Operation)
    }

    fn check_rate_limit<E>(&self, resource: &str) -> Result<(), GuardError<E>> {
        if self.rate_limiter.try_acquire(resource) {
            return Ok(());
        }
        Err(GuardError::RateLimited {
            resource: resource.to_string(),
            retry_after: self
                .rate_limiter
                .reset_time_ms(resource)
                .map(Duration::from_millis),
        })
    }

    fn check_circuit<E>(&self, resource: &str) -> Result<(), GuardError<E>> {
        if self.circuit_breaker.is_call_permitted(resource) {
            return Ok(());
        }
        Err(GuardError::CircuitOpen {
            resource: resource.to_string(),
        })
    }

    fn record_outcome(&self, resource: &str, success: bool) {
        if success {
            self.circuit_breaker.record_success(resource);
        } else {
            self.circuit_breaker.record_failure(resource);
        }
    }

    // Read-only snapshots for dashboards and health endpoints.

    /// Snapshot of `resource`'s breaker, or `None` if it has never been
    /// seen.
    pub fn breaker_metrics(&self, resource: &str) -> Option<BreakerMetrics> {
        self.circuit_breaker.metrics(resource)
    }

    /// State of every known breaker.
    pub fn all_breaker_states(&self) -> Vec<(String, BreakerState)> {
        self.circuit_breaker.all_states()
    }

    /// Names of individually degraded resources.
    pub fn degraded_resources(&self) -> Vec<String> {
        self.degradation.degraded_resources()
    }

    // Administrative surface.

    /// Forces `resource`'s breaker open.
    pub fn open_circuit_breaker(&self, resource: &str) {
        self.circuit_breaker.force_open(resource);
    }

    /// Forces `resource`'s breaker closed.
    pub fn close_circuit_breaker(&self, resource: &str) {
        self.circuit_breaker.force_close(resource);
    }

    /// Marks `resource` degraded.
    pub fn degrade(&self, resource: &str) {
        self.degradation.degrade(resource);
    }

    /// Clears `resource`'s degradation.
    pub fn recover(&self, resource: &str) {
        self.degradation.recover(resource);
    }

    pub fn enable_global_degradation(&self) {
        self.degradation.enable_global_degradation();
    }

    pub fn disable_global_degradation(&self) {
        self.degradation.disable_global_degradation();
    }

    /// Returns `resource`'s runtime state (limiter counters, breaker state)
    /// to a clean slate without touching any configuration.
    pub fn reset(&self, resource: &str) {
        self.rate_limiter.reset(resource);
        self.circuit_breaker.reset(resource);
        self.degradation.recover(resource);
    }

    /// Clears every registry completely. Administrative/test use.
    pub fn reset_all(&self) {
        self.rate_limiter.reset_all();
        self.circuit_breaker.reset_all();
        self.bulkhead.reset_all();
        self.retry.reset_all();
        self.degradation.reset_all();
        self.fallbacks.reset_all();
        self.protections.clear();
    }
}

impl Default for Resilience {
    fn default() -> Self {
        Self::new()
    }
}
