//! Bulkhead configuration.

use std::time::Duration;

/// Per-resource concurrency parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkheadConfig {
    pub(crate) max_concurrent_calls: usize,
    pub(crate) waiting_queue_capacity: usize,
    pub(crate) wait_timeout: Option<Duration>,
}

impl BulkheadConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    /// The concurrency cap.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls
    }

    /// How many callers may queue for a slot.
    pub fn waiting_queue_capacity(&self) -> usize {
        self.waiting_queue_capacity
    }

    /// How long a queued caller waits before rejection; `None` waits
    /// indefinitely.
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        BulkheadConfigBuilder::new().build()
    }
}

/// Builder for [`BulkheadConfig`].
#[derive(Debug, Clone)]
pub struct BulkheadConfigBuilder {
    max_concurrent_calls: usize,
    waiting_queue_capacity: usize,
    wait_timeout: Option<Duration>,
}

impl BulkheadConfigBuilder {
    /// Creates a builder with defaults.
    ///
    /// Defaults:
    /// - max_concurrent_calls: 25
    /// - waiting_queue_capacity: 50
    /// - wait_timeout: 500ms
    pub fn new() -> Self {
        Self {
            max_concurrent_calls: 25,
            waiting_queue_capacity: 50,
            wait_timeout: Some(Duration::from_millis(500)),
        }
    }

    /// Sets how many calls may run at once.
    pub fn max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = max.max(1);
        self
    }

    /// Sets how many callers may wait for a slot; callers beyond this are
    /// rejected immediately.
    pub fn waiting_queue_capacity(mut self, capacity: usize) -> Self {
        self.waiting_queue_capacity = capacity;
        self
    }

    /// Sets the bounded wait for a slot.
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Queued callers wait until a slot frees, however long that takes.
    pub fn wait_indefinitely(mut self) -> Self {
        self.wait_timeout = None;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> BulkheadConfig {
        BulkheadConfig {
            max_concurrent_calls: self.max_concurrent_calls,
            waiting_queue_capacity: self.waiting_queue_capacity,
            wait_timeout: self.wait_timeout,
        }
    }
}

impl Default for BulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
