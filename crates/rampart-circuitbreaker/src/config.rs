//! Circuit breaker configuration.

use std::time::Duration;

/// Per-resource breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerConfig {
    pub(crate) failure_ratio: f64,
    pub(crate) request_volume_threshold: u64,
    pub(crate) open_duration: Duration,
    pub(crate) success_threshold: u64,
}

impl BreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }

    /// Failure ratio at or above which the breaker opens.
    pub fn failure_ratio(&self) -> f64 {
        self.failure_ratio
    }

    /// Minimum recorded outcomes before the ratio is evaluated.
    pub fn request_volume_threshold(&self) -> u64 {
        self.request_volume_threshold
    }

    /// How long the breaker stays open before probing.
    pub fn open_duration(&self) -> Duration {
        self.open_duration
    }

    /// Consecutive half-open successes required to close.
    pub fn success_threshold(&self) -> u64 {
        self.success_threshold
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfigBuilder::new().build()
    }
}

/// Builder for [`BreakerConfig`].
#[derive(Debug, Clone)]
pub struct BreakerConfigBuilder {
    failure_ratio: f64,
    request_volume_threshold: u64,
    open_duration: Duration,
    success_threshold: u64,
}

impl BreakerConfigBuilder {
    /// Creates a builder with defaults.
    ///
    /// Defaults:
    /// - failure_ratio: 0.5
    /// - request_volume_threshold: 20
    /// - open_duration: 30 seconds
    /// - success_threshold: 1
    pub fn new() -> Self {
        Self {
            failure_ratio: 0.5,
            request_volume_threshold: 20,
            open_duration: Duration::from_secs(30),
            success_threshold: 1,
        }
    }

    /// Sets the failure ratio (0.0 to 1.0) at which the breaker opens.
    pub fn failure_ratio(mut self, ratio: f64) -> Self {
        self.failure_ratio = ratio;
        self
    }

    /// Sets the minimum number of recorded outcomes before the ratio is
    /// evaluated; below it the breaker never opens.
    pub fn request_volume_threshold(mut self, volume: u64) -> Self {
        self.request_volume_threshold = volume;
        self
    }

    /// Sets how long the breaker stays open before allowing trial calls.
    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.open_duration = duration;
        self
    }

    /// Sets how many half-open trial calls must succeed to close the
    /// breaker. Also bounds how many trials are admitted at once.
    pub fn success_threshold(mut self, count: u64) -> Self {
        self.success_threshold = count.max(1);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> BreakerConfig {
        BreakerConfig {
            failure_ratio: self.failure_ratio,
            request_volume_threshold: self.request_volume_threshold,
            open_duration: self.open_duration,
            success_threshold: self.success_threshold,
        }
    }
}

impl Default for BreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
