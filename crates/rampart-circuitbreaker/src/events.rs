//! Events emitted by the circuit breaker.

use crate::BreakerState;
use rampart_core::ResilienceEvent;
use std::time::Instant;

/// State-machine activity, one event per decision or transition.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The breaker moved between states.
    StateTransition {
        /// Resource whose breaker transitioned.
        resource: String,
        /// When the transition happened.
        timestamp: Instant,
        /// State before the transition.
        from: BreakerState,
        /// State after the transition.
        to: BreakerState,
    },
    /// A call was allowed through.
    CallPermitted {
        /// Resource the call targets.
        resource: String,
        /// When the decision was made.
        timestamp: Instant,
        /// State at decision time.
        state: BreakerState,
    },
    /// A call was rejected without running.
    CallRejected {
        /// Resource the call targeted.
        resource: String,
        /// When the decision was made.
        timestamp: Instant,
    },
    /// A success outcome was recorded.
    SuccessRecorded {
        /// Resource the outcome belongs to.
        resource: String,
        /// When it was recorded.
        timestamp: Instant,
    },
    /// A failure outcome was recorded.
    FailureRecorded {
        /// Resource the outcome belongs to.
        resource: String,
        /// When it was recorded.
        timestamp: Instant,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn resource(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { resource, .. }
            | CircuitBreakerEvent::CallPermitted { resource, .. }
            | CircuitBreakerEvent::CallRejected { resource, .. }
            | CircuitBreakerEvent::SuccessRecorded { resource, .. }
            | CircuitBreakerEvent::FailureRecorded { resource, .. } => resource,
        }
    }
}
