//! Events emitted by a circuit breaker.

use crate::CircuitState;
use hostguard_core::Event;
use std::time::{Duration, Instant};

/// Everything observable about a breaker's life.
#[derive(Debug, Clone)]
pub enum BreakerEvent {
    /// The circuit moved between states.
    StateTransition {
        /// Service the breaker guards.
        service: String,
        /// When the transition happened.
        at: Instant,
        /// State before.
        from: CircuitState,
        /// State after.
        to: CircuitState,
        /// Failure counter at the moment of transition.
        failure_count: u32,
        /// Success counter at the moment of transition.
        success_count: u32,
        /// Why the transition happened.
        reason: &'static str,
    },

    /// A call completed successfully.
    Success {
        service: String,
        at: Instant,
        /// State the success was recorded in.
        state: CircuitState,
        /// How long the call took.
        duration: Duration,
    },

    /// A call failed (error or timeout).
    Failure {
        service: String,
        at: Instant,
        state: CircuitState,
        /// Failure counter after recording this failure.
        failure_count: u32,
        /// True when the failure was a deadline expiry.
        timed_out: bool,
    },

    /// The open circuit rejected a call without invoking it.
    CallRejected { service: String, at: Instant },

    /// Cached-response fallback served a fresh entry.
    FallbackCacheHit {
        service: String,
        at: Instant,
        key: String,
    },

    /// Cached-response fallback found nothing usable.
    FallbackCacheMiss {
        service: String,
        at: Instant,
        key: String,
    },

    /// An alternative endpoint is being tried.
    AlternativeAttempt {
        service: String,
        at: Instant,
        endpoint: String,
    },

    /// An alternative endpoint answered; the rotation pointer moved to it.
    AlternativeSuccess {
        service: String,
        at: Instant,
        endpoint: String,
    },

    /// Every configured alternative failed.
    AlternativesExhausted { service: String, at: Instant },

    /// Accumulated metrics were reset to zero.
    MetricsReset { service: String, at: Instant },

    /// The breaker was shut down.
    Shutdown { service: String, at: Instant },
}

impl Event for BreakerEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::StateTransition { .. } => "state_transition",
            Self::Success { .. } => "success",
            Self::Failure { .. } => "failure",
            Self::CallRejected { .. } => "call_rejected",
            Self::FallbackCacheHit { .. } => "fallback_cache_hit",
            Self::FallbackCacheMiss { .. } => "fallback_cache_miss",
            Self::AlternativeAttempt { .. } => "alternative_attempt",
            Self::AlternativeSuccess { .. } => "alternative_success",
            Self::AlternativesExhausted { .. } => "alternatives_exhausted",
            Self::MetricsReset { .. } => "metrics_reset",
            Self::Shutdown { .. } => "shutdown",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::StateTransition { at, .. }
            | Self::Success { at, .. }
            | Self::Failure { at, .. }
            | Self::CallRejected { at, .. }
            | Self::FallbackCacheHit { at, .. }
            | Self::FallbackCacheMiss { at, .. }
            | Self::AlternativeAttempt { at, .. }
            | Self::AlternativeSuccess { at, .. }
            | Self::AlternativesExhausted { at, .. }
            | Self::MetricsReset { at, .. }
            | Self::Shutdown { at, .. } => *at,
        }
    }

    fn source(&self) -> &str {
        match self {
            Self::StateTransition { service, .. }
            | Self::Success { service, .. }
            | Self::Failure { service, .. }
            | Self::CallRejected { service, .. }
            | Self::FallbackCacheHit { service, .. }
            | Self::FallbackCacheMiss { service, .. }
            | Self::AlternativeAttempt { service, .. }
            | Self::AlternativeSuccess { service, .. }
            | Self::AlternativesExhausted { service, .. }
            | Self::MetricsReset { service, .. }
            | Self::Shutdown { service, .. } => service,
        }
    }
}
