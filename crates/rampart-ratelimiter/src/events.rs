//! Events emitted by the rate limiter.

use rampart_core::ResilienceEvent;
use std::time::Instant;

/// Admission decisions, one event per `try_acquire`/`acquire` outcome.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// Permits were granted.
    PermitsGranted {
        /// Resource the permits were drawn from.
        resource: String,
        /// When the decision was made.
        timestamp: Instant,
        /// Number of permits granted.
        permits: u64,
    },
    /// Admission was refused.
    PermitsRejected {
        /// Resource that refused admission.
        resource: String,
        /// When the decision was made.
        timestamp: Instant,
        /// Number of permits requested.
        permits: u64,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::PermitsGranted { .. } => "permits_granted",
            RateLimiterEvent::PermitsRejected { .. } => "permits_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::PermitsGranted { timestamp, .. }
            | RateLimiterEvent::PermitsRejected { timestamp, .. } => *timestamp,
        }
    }

    fn resource(&self) -> &str {
        match self {
            RateLimiterEvent::PermitsGranted { resource, .. }
            | RateLimiterEvent::PermitsRejected { resource, .. } => resource,
        }
    }
}
