//! Events emitted by the retry executor.

use rampart_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Per-call retry lifecycle.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt failed and another will follow after `delay`.
    Retrying {
        /// Resource being retried.
        resource: String,
        /// When the failure was observed.
        timestamp: Instant,
        /// 0-indexed attempt that just failed.
        attempt: u32,
        /// Sleep before the next attempt.
        delay: Duration,
    },
    /// The call eventually succeeded.
    Succeeded {
        /// Resource the call ran against.
        resource: String,
        /// When it succeeded.
        timestamp: Instant,
        /// Total attempts made.
        attempts: u32,
    },
    /// Every permitted attempt failed.
    Exhausted {
        /// Resource the call ran against.
        resource: String,
        /// When the final failure was observed.
        timestamp: Instant,
        /// Total attempts made.
        attempts: u32,
    },
    /// The error was classified non-retryable and propagated immediately.
    Aborted {
        /// Resource the call ran against.
        resource: String,
        /// When the error was observed.
        timestamp: Instant,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retrying { .. } => "retrying",
            RetryEvent::Succeeded { .. } => "succeeded",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::Aborted { .. } => "aborted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retrying { timestamp, .. }
            | RetryEvent::Succeeded { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::Aborted { timestamp, .. } => *timestamp,
        }
    }

    fn resource(&self) -> &str {
        match self {
            RetryEvent::Retrying { resource, .. }
            | RetryEvent::Succeeded { resource, .. }
            | RetryEvent::Exhausted { resource, .. }
            | RetryEvent::Aborted { resource, .. } => resource,
        }
    }
}
