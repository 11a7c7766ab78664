//! Typed event system for the hostguard patterns.
//!
//! Every pattern crate defines its own event enum and emits it through a
//! [`Listeners`] collection. There is no global emitter: each breaker,
//! orchestrator, or monitor owns its listener list, and consumers subscribe
//! on the instance they care about.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait implemented by the event enums of the pattern crates.
pub trait Event: Send + Sync + fmt::Debug {
    /// Returns the kind of event (e.g. "state_transition", "host_alerts").
    fn kind(&self) -> &'static str;

    /// Returns when this event occurred.
    fn timestamp(&self) -> Instant;

    /// Returns the service or host the event concerns.
    fn source(&self) -> &str;
}

/// Trait for consuming events.
pub trait EventListener<E: Event>: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: &E);
}

/// A collection of event listeners.
#[derive(Clone)]
pub struct Listeners<E: Event> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: Event> Listeners<E> {
    /// Creates an empty listener collection.
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

    /// Emits an event to all registered listeners.
    ///
    /// A panicking listener is isolated: the panic is caught so the
    /// remaining listeners still receive the event.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: Event> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A function-based event listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _marker: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps a closure as a listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: Event,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
