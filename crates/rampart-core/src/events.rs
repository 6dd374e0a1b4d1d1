//! Event system shared by the pattern registries.
//!
//! Each registry defines its own event enum (permit decisions, state
//! transitions, retry attempts) and emits through an [`EventListeners`]
//! collection, so operators can hook dashboards or logs without the
//! registries knowing about either.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait implemented by every pattern's event enum.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Short machine-readable event kind, e.g. `"state_transition"`.
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn timestamp(&self) -> Instant;

    /// The resource the event concerns.
    fn resource(&self) -> &str;
}

/// Receives events from one registry.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    /// Called synchronously on the emitting call path; keep it cheap.
    fn on_event(&self, event: &E);
}

/// A cloneable collection of listeners.
#[derive(Clone)]
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Adds a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to every listener.
    ///
    /// A panicking listener does not prevent the remaining listeners from
    /// running.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    /// True when no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a plain closure as a listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Creates a listener from `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
