//! Per-resource fallback strategies.
//!
//! When a protected call fails after every other pattern has had its say,
//! the [`FallbackRegistry`] decides what the caller receives instead of the
//! error. Strategies are registered per resource and value type; resolving
//! with a type other than the registered one behaves as if nothing were
//! registered, so a misconfigured resource degrades to propagating the
//! error rather than panicking.
//!
//! ```
//! use rampart_core::GuardError;
//! use rampart_degradation::DegradationRegistry;
//! use rampart_fallback::{FallbackRegistry, FallbackStrategy};
//!
//! let fallbacks = FallbackRegistry::new();
//! let degradation = DegradationRegistry::new();
//! fallbacks.register::<u32, ()>("svc", FallbackStrategy::Value(7));
//!
//! let err: GuardError<()> = GuardError::CircuitOpen { resource: "svc".into() };
//! let recovered = fallbacks.resolve::<u32, ()>("svc", err, &degradation);
//! assert_eq!(recovered.unwrap(), 7);
//! ```

use dashmap::DashMap;
use rampart_core::GuardError;
use rampart_degradation::DegradationRegistry;
use std::any::Any;
use std::sync::Arc;

/// What to hand the caller when a protected call ultimately fails.
pub enum FallbackStrategy<T, E> {
    /// The value type's [`Default`].
    Empty,
    /// A fixed value, cloned on every resolution.
    Value(T),
    /// The most recent successful result recorded for the resource, or the
    /// default if none has been recorded yet.
    Cached,
    /// The degraded implementation registered with the
    /// [`DegradationRegistry`], or the default if none is registered.
    Degraded,
    /// Propagate the error unchanged.
    Throw,
    /// Resolve the named resource's strategy instead. A single hop: if the
    /// target's strategy is itself a redirect, the error propagates.
    Redirect(String),
    /// Compute a replacement from the error.
    Handler(Arc<dyn Fn(&GuardError<E>) -> T + Send + Sync>),
}

impl<T: Clone, E> Clone for FallbackStrategy<T, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Value(v) => Self::Value(v.clone()),
            Self::Cached => Self::Cached,
            Self::Degraded => Self::Degraded,
            Self::Throw => Self::Throw,
            Self::Redirect(target) => Self::Redirect(target.clone()),
            Self::Handler(f) => Self::Handler(Arc::clone(f)),
        }
    }
}

impl<T, E> FallbackStrategy<T, E> {
    /// Wraps a closure as a [`FallbackStrategy::Handler`].
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&GuardError<E>) -> T + Send + Sync + 'static,
    {
        Self::Handler(Arc::new(f))
    }

    fn kind(&self) -> FallbackKind {
        match self {
            Self::Empty => FallbackKind::Empty,
            Self::Value(_) => FallbackKind::Value,
            Self::Cached => FallbackKind::Cached,
            Self::Degraded => FallbackKind::Degraded,
            Self::Throw => FallbackKind::Throw,
            Self::Redirect(_) => FallbackKind::Redirect,
            Self::Handler(_) => FallbackKind::Handler,
        }
    }
}

/// Type-independent view of a registered strategy, for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    Empty,
    Value,
    Cached,
    Degraded,
    Throw,
    Redirect,
    Handler,
}

struct Registration {
    kind: FallbackKind,
    strategy: Box<dyn Any + Send + Sync>,
}

/// Per-resource fallback strategies plus the cache backing
/// [`FallbackStrategy::Cached`].
pub struct FallbackRegistry {
    registrations: DashMap<String, Registration>,
    cache: DashMap<String, Box<dyn Any + Send + Sync>>,
}

impl FallbackRegistry {
    pub fn new() -> Self {
        Self {
            registrations: DashMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Registers `strategy` for `resource`, replacing any previous one. The
    /// value and error types are fixed at registration; resolving with
    /// different types behaves as if nothing were registered.
    pub fn register<T, E>(&self, resource: &str, strategy: FallbackStrategy<T, E>)
    where
        T: Clone + Send + Sync + 'static,
        E: 'static,
    {
        #[cfg(feature = "tracing")]
        tracing::debug!(resource, kind = ?strategy.kind(), "fallback registered");
        self.registrations.insert(
            resource.to_string(),
            Registration {
                kind: strategy.kind(),
                strategy: Box::new(strategy),
            },
        );
    }

    /// Removes `resource`'s strategy and cached value.
    pub fn unregister(&self, resource: &str) {
        self.registrations.remove(resource);
        self.cache.remove(resource);
    }

    /// The kind of strategy registered for `resource`, if any.
    pub fn registered(&self, resource: &str) -> Option<FallbackKind> {
        self.registrations.get(resource).map(|r| r.kind)
    }

    /// Records a successful result so [`FallbackStrategy::Cached`] has
    /// something to serve later.
    pub fn record_success<T>(&self, resource: &str, value: &T)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.cache
            .insert(resource.to_string(), Box::new(value.clone()));
    }

    /// The cached value for `resource`, if one of the requested type has
    /// been recorded.
    pub fn cached_value<T>(&self, resource: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.cache
            .get(resource)
            .and_then(|v| v.downcast_ref::<T>().cloned())
    }

    /// Resolves `error` through `resource`'s registered strategy. With no
    /// registration (or one of a different type) the error propagates.
    pub fn resolve<T, E>(
        &self,
        resource: &str,
        error: GuardError<E>,
        degradation: &DegradationRegistry,
    ) -> Result<T, GuardError<E>>
    where
        T: Clone + Default + Send + Sync + 'static,
        E: 'static,
    {
        self.resolve_inner(resource, error, degradation, true)
    }

    fn resolve_inner<T, E>(
        &self,
        resource: &str,
        error: GuardError<E>,
        degradation: &DegradationRegistry,
        allow_redirect: bool,
    ) -> Result<T, GuardError<E>>
    where
        T: Clone + Default + Send + Sync + 'static,
        E: 'static,
    {
        let strategy = match self.registrations.get(resource) {
            Some(registration) => match registration
                .strategy
                .downcast_ref::<FallbackStrategy<T, E>>()
            {
                Some(strategy) => strategy.clone(),
                None => return Err(error),
            },
            None => return Err(error),
        };

        match strategy {
            FallbackStrategy::Empty => Ok(T::default()),
            FallbackStrategy::Value(v) => Ok(v),
            FallbackStrategy::Cached => Ok(self.cached_value(resource).unwrap_or_default()),
            FallbackStrategy::Degraded => {
                Ok(degradation.degraded_value(resource).unwrap_or_default())
            }
            FallbackStrategy::Throw => Err(error),
            FallbackStrategy::Redirect(target) => {
                if allow_redirect {
                    self.resolve_inner(&target, error, degradation, false)
                } else {
                    Err(error)
                }
            }
            FallbackStrategy::Handler(f) => Ok(f(&error)),
        }
    }

    /// Names of resources with a registered strategy.
    pub fn resources(&self) -> Vec<String> {
        self.registrations.iter().map(|r| r.key().clone()).collect()
    }

    /// Clears every registration and cached value.
    pub fn reset_all(&self) {
        self.registrations.clear();
        self.cache.clear();
    }
}

impl Default for FallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_error() -> GuardError<()> {
        GuardError::CircuitOpen {
            resource: "svc".to_string(),
        }
    }

    #[test]
    fn unregistered_resource_propagates_the_error() {
        let registry = FallbackRegistry::new();
        let degradation = DegradationRegistry::new();
        let result = registry.resolve::<u32, ()>("svc", open_error(), &degradation);
        assert!(matches!(result, Err(GuardError::CircuitOpen { .. })));
    }

    #[test]
    fn value_strategy_returns_the_fixed_value() {
        let registry = FallbackRegistry::new();
        let degradation = DegradationRegistry::new();
        registry.register::<u32, ()>("svc", FallbackStrategy::Value(9));
        let result = registry.resolve::<u32, ()>("svc", open_error(), &degradation);
        assert_eq!(result.unwrap(), 9);
    }

    #[test]
    fn cached_strategy_serves_the_last_recorded_success() {
        let registry = FallbackRegistry::new();
        let degradation = DegradationRegistry::new();
        registry.register::<u32, ()>("svc", FallbackStrategy::Cached);

        // Nothing recorded yet: the zero value stands in.
        let cold = registry.resolve::<u32, ()>("svc", open_error(), &degradation);
        assert_eq!(cold.unwrap(), 0);

        registry.record_success("svc", &41u32);
        registry.record_success("svc", &42u32);
        let warm = registry.resolve::<u32, ()>("svc", open_error(), &degradation);
        assert_eq!(warm.unwrap(), 42);
    }

    #[test]
    fn degraded_strategy_pulls_from_the_degradation_registry() {
        let registry = FallbackRegistry::new();
        let degradation = DegradationRegistry::new();
        degradation.register_degraded_implementation("svc", || 5u32);
        registry.register::<u32, ()>("svc", FallbackStrategy::Degraded);

        let result = registry.resolve::<u32, ()>("svc", open_error(), &degradation);
        assert_eq!(result.unwrap(), 5);
    }

    #[test]
    fn throw_strategy_propagates() {
        let registry = FallbackRegistry::new();
        let degradation = DegradationRegistry::new();
        registry.register::<u32, ()>("svc", FallbackStrategy::Throw);
        let result = registry.resolve::<u32, ()>("svc", open_error(), &degradation);
        assert!(matches!(result, Err(GuardError::CircuitOpen { .. })));
    }

    #[test]
    fn redirect_resolves_exactly_one_hop() {
        let registry = FallbackRegistry::new();
        let degradation = DegradationRegistry::new();
        registry.register::<u32, ()>("a", FallbackStrategy::Redirect("b".to_string()));
        registry.register::<u32, ()>("b", FallbackStrategy::Value(3));
        registry.register::<u32, ()>("x", FallbackStrategy::Redirect("a".to_string()));

        let one_hop = registry.resolve::<u32, ()>("a", open_error(), &degradation);
        assert_eq!(one_hop.unwrap(), 3);

        // Redirect-to-redirect stops and propagates instead of chaining.
        let two_hops = registry.resolve::<u32, ()>("x", open_error(), &degradation);
        assert!(matches!(two_hops, Err(GuardError::CircuitOpen { .. })));
    }

    #[test]
    fn handler_sees_the_triggering_error() {
        let registry = FallbackRegistry::new();
        let degradation = DegradationRegistry::new();
        registry.register::<u32, ()>(
            "svc",
            FallbackStrategy::handler(|err| if err.is_circuit_open() { 1 } else { 2 }),
        );
        let result = registry.resolve::<u32, ()>("svc", open_error(), &degradation);
        assert_eq!(result.unwrap(), 1);
    }

    #[test]
    fn type_mismatch_behaves_as_unregistered() {
        let registry = FallbackRegistry::new();
        let degradation = DegradationRegistry::new();
        registry.register::<String, ()>("svc", FallbackStrategy::Empty);
        let result = registry.resolve::<u32, ()>("svc", open_error(), &degradation);
        assert!(matches!(result, Err(GuardError::CircuitOpen { .. })));
    }

    #[test]
    fn unregister_clears_strategy_and_cache() {
        let registry = FallbackRegistry::new();
        registry.register::<u32, ()>("svc", FallbackStrategy::Cached);
        registry.record_success("svc", &1u32);
        registry.unregister("svc");

        assert_eq!(registry.registered("svc"), None);
        assert_eq!(registry.cached_value::<u32>("svc"), None);
    }
}
