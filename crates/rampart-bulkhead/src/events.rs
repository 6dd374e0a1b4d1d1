//! Events emitted by the bulkhead.

use rampart_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Admission and completion activity for one resource's bulkhead.
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call entered the bulkhead.
    CallPermitted {
        /// Resource the call entered.
        resource: String,
        /// When it entered.
        timestamp: Instant,
        /// Calls running inside the bulkhead after admission.
        active_calls: usize,
    },
    /// A call was rejected (full queue or wait timeout).
    CallRejected {
        /// Resource that rejected the call.
        resource: String,
        /// When it was rejected.
        timestamp: Instant,
    },
    /// A call released its slot.
    CallFinished {
        /// Resource the call ran against.
        resource: String,
        /// When the slot was released.
        timestamp: Instant,
        /// How long the slot was held.
        held_for: Duration,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::CallFinished { .. } => "call_finished",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. }
            | BulkheadEvent::CallRejected { timestamp, .. }
            | BulkheadEvent::CallFinished { timestamp, .. } => *timestamp,
        }
    }

    fn resource(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { resource, .. }
            | BulkheadEvent::CallRejected { resource, .. }
            | BulkheadEvent::CallFinished { resource, .. } => resource,
        }
    }
}
