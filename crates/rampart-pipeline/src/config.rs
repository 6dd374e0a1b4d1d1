//! Per-resource protection configuration.

use std::time::Duration;

/// How many stages [`protect`](crate::Resilience::protect) wraps around a
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionLevel {
    /// Rate limiter, circuit breaker, degradation check, bulkhead, retry
    /// under an overall timeout, then fallback.
    Full,
    /// Circuit breaker, retry, then fallback.
    Standard,
    /// Circuit breaker, then fallback.
    Light,
}

/// Per-resource protection settings.
///
/// `timeout` bounds the whole retry sequence in a [`ProtectionLevel::Full`]
/// pipeline, not each attempt. `None` disables the timeout stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionConfig {
    pub level: ProtectionLevel,
    pub timeout: Option<Duration>,
}

impl ProtectionConfig {
    pub fn builder() -> ProtectionConfigBuilder {
        ProtectionConfigBuilder::default()
    }

    /// Shorthand for a pipeline at `level` with the default timeout.
    pub fn at_level(level: ProtectionLevel) -> Self {
        Self::builder().level(level).build()
    }
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ProtectionConfig`].
#[derive(Debug, Clone)]
pub struct ProtectionConfigBuilder {
    level: ProtectionLevel,
    timeout: Option<Duration>,
}

impl Default for ProtectionConfigBuilder {
    fn default() -> Self {
        Self {
            level: ProtectionLevel::Full,
            timeout: Some(Duration::from_secs(1)),
        }
    }
}

impl ProtectionConfigBuilder {
    pub fn level(mut self, level: ProtectionLevel) -> Self {
        self.level = level;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disables the overall timeout stage.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn build(self) -> ProtectionConfig {
        ProtectionConfig {
            level: self.level,
            timeout: self.timeout,
        }
    }
}
