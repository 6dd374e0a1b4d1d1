//! Core infrastructure shared by every rampart registry.
//!
//! This crate provides the pieces the pattern crates have in common:
//! - [`GuardError`], the unified error type covering every stage of a
//!   protection pipeline
//! - the event system ([`ResilienceEvent`], [`EventListeners`]) used for
//!   observability
//! - the [`Clock`] abstraction so time-based admission math is testable
//!   without sleeping

pub mod clock;
pub mod error;
pub mod events;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::GuardError;
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};

/// Key identifying one independently guarded logical operation.
///
/// All per-resource state (buckets, breakers, bulkhead slots, rules,
/// fallbacks) is keyed by this name; every caller using the same name shares
/// the same state.
pub type ResourceName = String;
