//! Rate limit configuration.

use std::time::Duration;

/// Admission algorithm used for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitAlgorithm {
    /// Counter reset at every window boundary. Simple; admits boundary
    /// bursts of up to twice the configured rate.
    FixedWindow,
    /// Weighted two-window limiter: the previous window's count decays
    /// linearly as the current window fills, smoothing boundary bursts.
    SlidingWindow,
    /// Permits refill continuously at `max_permits / window`; bursts up to
    /// the bucket size are allowed.
    TokenBucket,
    /// Admitted work drains at `max_permits / window`; admission is refused
    /// while the bucket is full.
    LeakyBucket,
    /// `max_permits` is an in-flight cap rather than a rate; callers must
    /// pair every acquire with a [`release`].
    ///
    /// [`release`]: crate::RateLimiter::release
    Concurrent,
}

/// Per-resource rate limit parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub(crate) max_permits: u64,
    pub(crate) window: Duration,
    pub(crate) algorithm: RateLimitAlgorithm,
}

impl RateLimitConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }

    /// Shorthand for `max_permits` per `window` with the default algorithm.
    pub fn per_window(max_permits: u64, window: Duration) -> Self {
        Self::builder()
            .max_permits(max_permits)
            .window(window)
            .build()
    }

    /// The configured permit ceiling.
    pub fn max_permits(&self) -> u64 {
        self.max_permits
    }

    /// The configured window duration.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// The configured admission algorithm.
    pub fn algorithm(&self) -> RateLimitAlgorithm {
        self.algorithm
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfigBuilder::new().build()
    }
}

/// Builder for [`RateLimitConfig`].
#[derive(Debug, Clone)]
pub struct RateLimitConfigBuilder {
    max_permits: u64,
    window: Duration,
    algorithm: RateLimitAlgorithm,
}

impl RateLimitConfigBuilder {
    /// Creates a builder with defaults.
    ///
    /// Defaults:
    /// - max_permits: 50
    /// - window: 1 second
    /// - algorithm: SlidingWindow
    pub fn new() -> Self {
        Self {
            max_permits: 50,
            window: Duration::from_secs(1),
            algorithm: RateLimitAlgorithm::SlidingWindow,
        }
    }

    /// Sets the permit ceiling per window (or in-flight cap for
    /// [`RateLimitAlgorithm::Concurrent`]).
    pub fn max_permits(mut self, max_permits: u64) -> Self {
        self.max_permits = max_permits;
        self
    }

    /// Sets the window duration. Ignored by the concurrent algorithm.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Selects the admission algorithm.
    pub fn algorithm(mut self, algorithm: RateLimitAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RateLimitConfig {
        RateLimitConfig {
            max_permits: self.max_permits,
            window: self.window,
            algorithm: self.algorithm,
        }
    }
}

impl Default for RateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
