//! Core infrastructure shared by the hostguard pattern crates.
//!
//! Provides the typed event system used by the circuit breaker, fallback
//! orchestrator, and monitor for observability, and the bounded TTL cache
//! both orchestration crates store fallback responses in.

mod cache;
mod events;

pub use cache::TtlCache;
pub use events::{Event, EventListener, FnListener, Listeners};
