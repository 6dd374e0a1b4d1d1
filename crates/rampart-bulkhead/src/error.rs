//! Bulkhead rejection outcomes.
//!
//! Rejection is a first-class value rather than an unwind so the pipeline
//! can route it straight to a fallback.

use rampart_core::GuardError;
use std::time::Duration;

/// Why a bulkhead refused admission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BulkheadError {
    /// No slot free and the waiting queue is at capacity.
    #[error("bulkhead for '{resource}' is full ({max_concurrent_calls} concurrent calls)")]
    Full {
        /// The saturated resource.
        resource: String,
        /// Its concurrency cap.
        max_concurrent_calls: usize,
    },
    /// Queued, but no slot freed within the wait timeout.
    #[error("timed out after {waited:?} waiting for a '{resource}' bulkhead slot")]
    Timeout {
        /// The saturated resource.
        resource: String,
        /// How long the caller waited.
        waited: Duration,
        /// Its concurrency cap.
        max_concurrent_calls: usize,
    },
}

impl<E> From<BulkheadError> for GuardError<E> {
    fn from(err: BulkheadError) -> Self {
        match err {
            BulkheadError::Full {
                resource,
                max_concurrent_calls,
            } => GuardError::BulkheadFull {
                resource,
                max_concurrent: max_concurrent_calls,
            },
            // A queue-wait timeout is still an admission rejection: the
            // wrapped operation never ran.
            BulkheadError::Timeout {
                resource,
                max_concurrent_calls,
                ..
            } => GuardError::BulkheadFull {
                resource,
                max_concurrent: max_concurrent_calls,
            },
        }
    }
}
