//! Breaker configuration.

use crate::events::BreakerEvent;
use crate::CircuitState;
use hostguard_core::{FnListener, Listeners};
use std::collections::HashMap;
use std::time::Duration;

/// What the breaker does with a call's failure once the state machine has
/// recorded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackMode {
    /// Surface the error immediately.
    #[default]
    FailFast,
    /// Serve a cached response for the call's cache key; a miss surfaces
    /// the original error.
    CachedResponse,
    /// Re-run the operation against each configured alternative endpoint in
    /// rotation order; exhaustion surfaces the original error.
    AlternativeService,
}

/// An alternative service endpoint the breaker can retarget calls to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Name used in events.
    pub name: String,
    /// Address the operation should target.
    pub address: String,
    /// Per-endpoint call deadline; the breaker's default applies when unset.
    pub timeout: Option<Duration>,
    /// Free-form metadata (headers, credentials handles) the operation may
    /// want when retargeting.
    pub metadata: HashMap<String, String>,
}

impl Endpoint {
    /// Creates an endpoint with just a name and address.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            timeout: None,
            metadata: HashMap::new(),
        }
    }
}

/// Per-call options for [`CircuitBreaker::execute_with`](crate::CircuitBreaker::execute_with).
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overrides the breaker's default call deadline.
    pub timeout: Option<Duration>,
    /// Key for the cached-response fallback; also enables populating the
    /// cache on success. Falls back to the service name when unset.
    pub cache_key: Option<String>,
}

/// Configuration for a [`CircuitBreaker`](crate::CircuitBreaker).
pub struct BreakerConfig {
    pub(crate) failure_threshold: u32,
    pub(crate) success_threshold: u32,
    pub(crate) open_timeout: Duration,
    pub(crate) call_timeout: Duration,
    pub(crate) fallback: FallbackMode,
    pub(crate) cache_ttl: Duration,
    pub(crate) cache_capacity: usize,
    pub(crate) alternatives: Vec<Endpoint>,
    pub(crate) listeners: Listeners<BreakerEvent>,
}

impl BreakerConfig {
    /// Creates a configuration builder.
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }

    /// Adds a listener to an already-built configuration; the registry uses
    /// this to attach its forwarding hook.
    pub fn with_listener<L>(mut self, listener: L) -> Self
    where
        L: hostguard_core::EventListener<BreakerEvent> + 'static,
    {
        self.listeners.add(listener);
        self
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`BreakerConfig`].
pub struct BreakerConfigBuilder {
    failure_threshold: u32,
    success_threshold: u32,
    open_timeout: Duration,
    call_timeout: Duration,
    fallback: FallbackMode,
    cache_ttl: Duration,
    cache_capacity: usize,
    alternatives: Vec<Endpoint>,
    listeners: Listeners<BreakerEvent>,
}

impl BreakerConfigBuilder {
    /// Creates a builder with the defaults used across the fleet.
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            open_timeout: Duration::from_secs(60),
            call_timeout: Duration::from_secs(30),
            fallback: FallbackMode::FailFast,
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 100,
            alternatives: Vec::new(),
            listeners: Listeners::new(),
        }
    }

    /// Consecutive-failure budget before the circuit opens.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n.max(1);
        self
    }

    /// Successes required in half-open before the circuit closes.
    ///
    /// Default: 3
    pub fn success_threshold(mut self, n: u32) -> Self {
        self.success_threshold = n.max(1);
        self
    }

    /// How long the circuit stays open before a recovery probe is allowed;
    /// also the half-open watchdog duration.
    ///
    /// Default: 60 seconds
    pub fn open_timeout(mut self, d: Duration) -> Self {
        self.open_timeout = d;
        self
    }

    /// Default deadline applied to every call (overridable per call).
    ///
    /// Default: 30 seconds
    pub fn call_timeout(mut self, d: Duration) -> Self {
        self.call_timeout = d;
        self
    }

    /// Failure-handling mode.
    ///
    /// Default: [`FallbackMode::FailFast`]
    pub fn fallback(mut self, mode: FallbackMode) -> Self {
        self.fallback = mode;
        self
    }

    /// Time-to-live for entries in the cached-response fallback cache.
    ///
    /// Default: 5 minutes
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Capacity of the cached-response fallback cache.
    ///
    /// Default: 100 entries
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Appends an alternative endpoint to the rotation.
    pub fn alternative(mut self, endpoint: Endpoint) -> Self {
        self.alternatives.push(endpoint);
        self
    }

    /// Replaces the alternative-endpoint rotation.
    pub fn alternatives(mut self, endpoints: Vec<Endpoint>) -> Self {
        self.alternatives = endpoints;
        self
    }

    /// Adds a raw event listener.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: hostguard_core::EventListener<BreakerEvent> + 'static,
    {
        self.listeners.add(listener);
        self
    }

    /// Registers a callback for state transitions.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.listeners
            .add(FnListener::new(move |event: &BreakerEvent| {
                if let BreakerEvent::StateTransition { from, to, .. } = event {
                    f(*from, *to);
                }
            }));
        self
    }

    /// Registers a callback for recorded failures, receiving the failure
    /// counter after the failure.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.listeners
            .add(FnListener::new(move |event: &BreakerEvent| {
                if let BreakerEvent::Failure { failure_count, .. } = event {
                    f(*failure_count);
                }
            }));
        self
    }

    /// Registers a callback for calls rejected by the open circuit.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners
            .add(FnListener::new(move |event: &BreakerEvent| {
                if matches!(event, BreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            open_timeout: self.open_timeout,
            call_timeout: self.call_timeout,
            fallback: self.fallback,
            cache_ttl: self.cache_ttl,
            cache_capacity: self.cache_capacity,
            alternatives: self.alternatives,
            listeners: self.listeners,
        }
    }
}

impl Default for BreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
