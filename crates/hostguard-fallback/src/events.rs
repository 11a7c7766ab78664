//! Events emitted by the fallback orchestrator and its retry queue.

use crate::StrategyKind;
use hostguard_core::Event;
use std::time::{Duration, Instant};

/// Observable outcomes of orchestrated calls and queued retries.
#[derive(Debug, Clone)]
pub enum FallbackEvent {
    /// A strategy is about to run for an operation.
    Attempt {
        service: String,
        at: Instant,
        op_id: u64,
        strategy: StrategyKind,
    },

    /// A strategy failed; the next one will be attempted.
    StrategyFailed {
        service: String,
        at: Instant,
        op_id: u64,
        strategy: StrategyKind,
        error: String,
    },

    /// A strategy produced the result; the chain stops here.
    Recovered {
        service: String,
        at: Instant,
        op_id: u64,
        strategy: StrategyKind,
        duration: Duration,
    },

    /// Every selected strategy failed.
    Exhausted {
        service: String,
        at: Instant,
        op_id: u64,
        attempts: usize,
    },

    /// A cache-serving strategy answered from cache.
    CacheHit {
        service: String,
        at: Instant,
        key: String,
    },

    /// Retry-with-backoff is sleeping before another attempt.
    RetryAttempt {
        service: String,
        at: Instant,
        attempt: u32,
        delay: Duration,
    },

    /// Graceful degradation dropped features and is retrying.
    Degraded {
        service: String,
        at: Instant,
        kept_features: usize,
    },

    /// An alternative endpoint is being tried.
    AlternativeAttempt {
        service: String,
        at: Instant,
        endpoint: String,
    },

    /// An alternative endpoint answered.
    AlternativeSuccess {
        service: String,
        at: Instant,
        endpoint: String,
    },

    /// An operation was parked on the retry queue.
    QueueEnqueued {
        service: String,
        at: Instant,
        item_id: u64,
        depth: usize,
    },

    /// The queue is reattempting a parked operation.
    QueueRetry {
        service: String,
        at: Instant,
        item_id: u64,
        attempt: u32,
    },

    /// A parked operation finally succeeded.
    QueueSuccess {
        service: String,
        at: Instant,
        item_id: u64,
    },

    /// A parked operation ran out of attempts.
    QueueGaveUp {
        service: String,
        at: Instant,
        item_id: u64,
        attempts: u32,
    },

    /// The orchestrator shut down.
    Shutdown { service: String, at: Instant },
}

impl Event for FallbackEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::Attempt { .. } => "attempt",
            Self::StrategyFailed { .. } => "strategy_failed",
            Self::Recovered { .. } => "recovered",
            Self::Exhausted { .. } => "exhausted",
            Self::CacheHit { .. } => "cache_hit",
            Self::RetryAttempt { .. } => "retry_attempt",
            Self::Degraded { .. } => "degraded",
            Self::AlternativeAttempt { .. } => "alternative_attempt",
            Self::AlternativeSuccess { .. } => "alternative_success",
            Self::QueueEnqueued { .. } => "queue_enqueued",
            Self::QueueRetry { .. } => "queue_retry",
            Self::QueueSuccess { .. } => "queue_success",
            Self::QueueGaveUp { .. } => "queue_gave_up",
            Self::Shutdown { .. } => "shutdown",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Attempt { at, .. }
            | Self::StrategyFailed { at, .. }
            | Self::Recovered { at, .. }
            | Self::Exhausted { at, .. }
            | Self::CacheHit { at, .. }
            | Self::RetryAttempt { at, .. }
            | Self::Degraded { at, .. }
            | Self::AlternativeAttempt { at, .. }
            | Self::AlternativeSuccess { at, .. }
            | Self::QueueEnqueued { at, .. }
            | Self::QueueRetry { at, .. }
            | Self::QueueSuccess { at, .. }
            | Self::QueueGaveUp { at, .. }
            | Self::Shutdown { at, .. } => *at,
        }
    }

    fn source(&self) -> &str {
        match self {
            Self::Attempt { service, .. }
            | Self::StrategyFailed { service, .. }
            | Self::Recovered { service, .. }
            | Self::Exhausted { service, .. }
            | Self::CacheHit { service, .. }
            | Self::RetryAttempt { service, .. }
            | Self::Degraded { service, .. }
            | Self::AlternativeAttempt { service, .. }
            | Self::AlternativeSuccess { service, .. }
            | Self::QueueEnqueued { service, .. }
            | Self::QueueRetry { service, .. }
            | Self::QueueSuccess { service, .. }
            | Self::QueueGaveUp { service, .. }
            | Self::Shutdown { service, .. } => service,
        }
    }
}
