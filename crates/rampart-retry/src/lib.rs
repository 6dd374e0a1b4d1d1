//! Bounded re-attempts with backoff.
//!
//! A [`RetryExecutor`] holds one [`RetryRule`] per resource name and wraps a
//! zero-argument async operation with up to `max_retries` re-attempts. The
//! delay before re-attempt *n* comes from the rule's [`BackoffStrategy`]
//! (immediate, fixed, exponential, fibonacci, or random), plus uniform
//! jitter, capped at the rule's `max_delay`.
//!
//! Which errors are worth retrying is the caller's call: pass a predicate to
//! [`execute_with_condition`](RetryExecutor::execute_with_condition), or use
//! [`execute`](RetryExecutor::execute) to retry every error. Exhaustion
//! re-raises the last error as [`GuardError::RetriesExhausted`].
//!
//! ```
//! use rampart_retry::{BackoffStrategy, RetryExecutor, RetryRule};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let retry = RetryExecutor::new();
//! retry.configure(
//!     "api",
//!     RetryRule::builder()
//!         .max_retries(3)
//!         .delay(Duration::from_millis(100))
//!         .strategy(BackoffStrategy::Exponential)
//!         .build(),
//! );
//!
//! let result: Result<u32, _> = retry.execute("api", || async { Ok::<_, String>(2) }).await;
//! # let _ = result;
//! # }
//! ```

mod backoff;
mod config;
mod events;

pub use config::{BackoffStrategy, RetryRule, RetryRuleBuilder};
pub use events::RetryEvent;

use dashmap::DashMap;
use rampart_core::{EventListener, EventListeners, FnListener, GuardError};
use std::future::Future;
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Registry of retry rules keyed by resource name.
pub struct RetryExecutor {
    rules: DashMap<String, RetryRule>,
    default_rule: RetryRule,
    listeners: EventListeners<RetryEvent>,
}

impl RetryExecutor {
    /// Creates an executor using the default rule for unconfigured
    /// resources.
    pub fn new() -> Self {
        Self {
            rules: DashMap::new(),
            default_rule: RetryRule::default(),
            listeners: EventListeners::new(),
        }
    }

    /// Sets the rule applied to resources used before being explicitly
    /// configured.
    pub fn default_rule(mut self, rule: RetryRule) -> Self {
        self.default_rule = rule;
        self
    }

    /// Adds an event listener. Call before sharing the executor.
    pub fn subscribe<L>(&mut self, listener: L)
    where
        L: EventListener<RetryEvent> + 'static,
    {
        self.listeners.add(listener);
    }

    /// Registers a callback invoked before each backoff sleep.
    pub fn on_retry<F>(&mut self, f: F)
    where
        F: Fn(&str, u32, std::time::Duration) + Send + Sync + 'static,
    {
        self.listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retrying {
                resource,
                attempt,
                delay,
                ..
            } = event
            {
                f(resource, *attempt, *delay);
            }
        }));
    }

    /// Applies `rule` to `resource`. Rules are stateless, so repeated calls
    /// with the same values are trivially idempotent.
    pub fn configure(&self, resource: &str, rule: RetryRule) {
        self.rules.insert(resource.to_string(), rule);
    }

    /// The effective rule for `resource`.
    pub fn rule_of(&self, resource: &str) -> RetryRule {
        self.rules
            .get(resource)
            .map(|r| *r)
            .unwrap_or(self.default_rule)
    }

    /// Drops `resource`'s rule, returning it to the default.
    pub fn remove(&self, resource: &str) {
        self.rules.remove(resource);
    }

    /// Drops every rule. Administrative/test use.
    pub fn reset_all(&self) {
        self.rules.clear();
    }

    /// Runs `op`, retrying every error up to the rule's budget.
    pub async fn execute<F, Fut, T, E>(&self, resource: &str, op: F) -> Result<T, GuardError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_condition(resource, op, |_| true).await
    }

    /// Runs `op`, retrying only errors for which `retryable` returns true.
    ///
    /// A non-retryable error propagates immediately as
    /// [`GuardError::Operation`]; exhaustion re-raises the last error as
    /// [`GuardError::RetriesExhausted`]. With `max_retries = 0` the
    /// operation runs exactly once and never sleeps.
    pub async fn execute_with_condition<F, Fut, T, E, P>(
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
        let rule = self.rule_of(resource);
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(value) => {
                    self.listeners.emit(&RetryEvent::Succeeded {
                        resource: resource.to_string(),
                        timestamp: Instant::now(),
                        attempts: attempt + 1,
                    });
                    return Ok(value);
                }
                Err(error) => {
                    if !retryable(&error) {
                        self.listeners.emit(&RetryEvent::Aborted {
                            resource: resource.to_string(),
                            timestamp: Instant::now(),
                        });
                        return Err(GuardError::Operation(error));
                    }
                    if attempt >= rule.max_retries {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            resource,
                            attempts = attempt + 1,
                            "retries exhausted"
                        );

                        #[cfg(feature = "metrics")]
                        counter!("retry_exhausted_total", "resource" => resource.to_string())
                            .increment(1);

                        self.listeners.emit(&RetryEvent::Exhausted {
                            resource: resource.to_string(),
                            timestamp: Instant::now(),
                            attempts: attempt + 1,
                        });
                        return Err(GuardError::RetriesExhausted {
                            resource: resource.to_string(),
                            attempts: attempt + 1,
                            source: error,
                        });
                    }

                    let delay = backoff::delay_for(&rule, attempt);
                    self.listeners.emit(&RetryEvent::Retrying {
                        resource: resource.to_string(),
                        timestamp: Instant::now(),
                        attempt,
                        delay,
                    });

                    #[cfg(feature = "metrics")]
                    counter!("retry_attempts_total", "resource" => resource.to_string())
                        .increment(1);

                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}
