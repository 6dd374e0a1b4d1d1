//! Retry rules.

use std::time::Duration;

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// No delay between attempts.
    Immediate,
    /// The base delay every time.
    Fixed,
    /// Base delay doubled per attempt.
    Exponential,
    /// Base delay times the Fibonacci sequence.
    Fibonacci,
    /// Base delay times uniform(0, 2) per attempt.
    Random,
}

/// Per-resource retry parameters.
///
/// Stateless and shared read-only across concurrent invocations of the same
/// resource; which errors are retryable is decided by a caller-supplied
/// predicate, not by the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryRule {
    pub(crate) max_retries: u32,
    pub(crate) delay: Duration,
    pub(crate) strategy: BackoffStrategy,
    pub(crate) jitter: Duration,
    pub(crate) max_delay: Option<Duration>,
}

impl RetryRule {
    /// Creates a new rule builder.
    pub fn builder() -> RetryRuleBuilder {
        RetryRuleBuilder::new()
    }

    /// Re-attempts after the initial call. Zero means exactly one attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// The base delay fed to the strategy.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// The configured backoff strategy.
    pub fn strategy(&self) -> BackoffStrategy {
        self.strategy
    }

    /// Upper bound of the uniform jitter added to every delay.
    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    /// Cap applied to the final delay, when set.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }
}

impl Default for RetryRule {
    fn default() -> Self {
        RetryRuleBuilder::new().build()
    }
}

/// Builder for [`RetryRule`].
#[derive(Debug, Clone)]
pub struct RetryRuleBuilder {
    max_retries: u32,
    delay: Duration,
    strategy: BackoffStrategy,
    jitter: Duration,
    max_delay: Option<Duration>,
}

impl RetryRuleBuilder {
    /// Creates a builder with defaults.
    ///
    /// Defaults:
    /// - max_retries: 3
    /// - delay: 500ms
    /// - strategy: Fixed
    /// - jitter: none
    /// - max_delay: none
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(500),
            strategy: BackoffStrategy::Fixed,
            jitter: Duration::ZERO,
            max_delay: None,
        }
    }

    /// Sets how many re-attempts follow the initial call.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the base delay.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Selects the backoff strategy.
    pub fn strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Adds uniform random jitter in `[0, jitter]` to every delay.
    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Caps the final delay (after jitter).
    pub fn max_delay(mut self, cap: Duration) -> Self {
        self.max_delay = Some(cap);
        self
    }

    /// Builds the rule.
    pub fn build(self) -> RetryRule {
        RetryRule {
            max_retries: self.max_retries,
            delay: self.delay,
            strategy: self.strategy,
            jitter: self.jitter,
            max_delay: self.max_delay,
        }
    }
}

impl Default for RetryRuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
