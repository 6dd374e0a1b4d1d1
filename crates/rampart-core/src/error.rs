//! The unified error type for composed protection pipelines.
//!
//! Each stage of a pipeline can reject or fail a call for its own reason:
//! the rate limiter sheds it, the circuit breaker is open, the bulkhead is
//! full, the overall budget times out, or the operation itself keeps failing
//! until retries are exhausted. [`GuardError`] covers all of them so callers
//! composing several stages match on one enum instead of writing conversion
//! boilerplate per stage.
//!
//! Admission rejections ([`GuardError::RateLimited`],
//! [`GuardError::CircuitOpen`], [`GuardError::BulkheadFull`]) mean the
//! wrapped operation never ran. [`GuardError::RetriesExhausted`] and
//! [`GuardError::Operation`] carry the operation's own error.

use std::fmt;
use std::time::Duration;

/// Error produced by a guarded call, parameterized over the operation's own
/// error type `E`.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardError<E> {
    /// The rate limiter refused admission.
    RateLimited {
        /// Resource that shed the call.
        resource: String,
        /// Time until the current window rolls over, when known.
        retry_after: Option<Duration>,
    },
    /// The circuit breaker is open and rejected the call.
    CircuitOpen {
        /// Resource whose breaker is open.
        resource: String,
    },
    /// The bulkhead had no free slot within the configured wait.
    BulkheadFull {
        /// Resource whose bulkhead is saturated.
        resource: String,
        /// Configured concurrency cap.
        max_concurrent: usize,
    },
    /// The overall call budget elapsed before the operation finished.
    Timeout {
        /// Resource the call was made against.
        resource: String,
        /// The budget that was exceeded.
        budget: Duration,
    },
    /// Every attempt failed; carries the last observed error.
    RetriesExhausted {
        /// Resource the call was made against.
        resource: String,
        /// Total attempts made (initial call plus retries).
        attempts: u32,
        /// The error from the final attempt.
        source: E,
    },
    /// The operation failed and no retry policy applied (or none retried it).
    Operation(E),
}

impl<E> GuardError<E> {
    /// True if the call was shed before any user code ran.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            GuardError::RateLimited { .. }
                | GuardError::CircuitOpen { .. }
                | GuardError::BulkheadFull { .. }
        )
    }

    /// True for [`GuardError::RateLimited`].
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GuardError::RateLimited { .. })
    }

    /// True for [`GuardError::CircuitOpen`].
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, GuardError::CircuitOpen { .. })
    }

    /// True for [`GuardError::BulkheadFull`].
    pub fn is_bulkhead_full(&self) -> bool {
        matches!(self, GuardError::BulkheadFull { .. })
    }

    /// True for [`GuardError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, GuardError::Timeout { .. })
    }

    /// The stage that produced this error, for logs and metrics labels.
    pub fn stage(&self) -> &'static str {
        match self {
            GuardError::RateLimited { .. } => "rate_limiter",
            GuardError::CircuitOpen { .. } => "circuit_breaker",
            GuardError::BulkheadFull { .. } => "bulkhead",
            GuardError::Timeout { .. } => "timeout",
            GuardError::RetriesExhausted { .. } => "retry",
            GuardError::Operation(_) => "operation",
        }
    }

    /// Returns the operation's own error, if this carries one.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            GuardError::RetriesExhausted { source, .. } => Some(source),
            GuardError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Consumes the error, returning the operation's own error if present.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            GuardError::RetriesExhausted { source, .. } => Some(source),
            GuardError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for GuardError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardError::RateLimited {
                resource,
                retry_after,
            } => match retry_after {
                Some(d) => write!(f, "rate limited on '{resource}', retry after {d:?}"),
                None => write!(f, "rate limited on '{resource}'"),
            },
            GuardError::CircuitOpen { resource } => {
                write!(f, "circuit breaker for '{resource}' is open")
            }
            GuardError::BulkheadFull {
                resource,
                max_concurrent,
            } => write!(
                f,
                "bulkhead for '{resource}' is full ({max_concurrent} concurrent calls)"
            ),
            GuardError::Timeout { resource, budget } => {
                write!(f, "call to '{resource}' exceeded its {budget:?} budget")
            }
            GuardError::RetriesExhausted {
                resource,
                attempts,
                source,
            } => write!(
                f,
                "'{resource}' still failing after {attempts} attempts: {source}"
            ),
            GuardError::Operation(e) => write!(f, "operation failed: {e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for GuardError<E> {}
