use hostguard_breaker::BreakerError;
use std::time::Duration;
use thiserror::Error;

/// Errors a strategy (or the whole chain) can fail with.
#[derive(Debug, Error)]
pub enum FallbackError<E> {
    /// The operation did not settle within its deadline.
    #[error("operation timed out after {after:?}")]
    Timeout {
        /// Deadline that elapsed.
        after: Duration,
    },

    /// The delegated circuit breaker rejected the call.
    #[error("circuit open for {service}")]
    CircuitOpen {
        /// Service the breaker guards.
        service: String,
    },

    /// The deferred-retry queue is at capacity.
    #[error("retry queue is full")]
    QueueFull,

    /// The queue shut down (or gave up without a final error) before the
    /// parked operation completed.
    #[error("retry queue closed before the operation completed")]
    QueueClosed,

    /// The operation's own error.
    #[error("operation error: {0}")]
    Application(E),

    /// Terminal: every selected strategy failed. `last` is the error of
    /// the final strategy attempted, absent only when no strategy ran.
    #[error("all fallback strategies exhausted after {attempts} attempt(s)")]
    Exhausted {
        /// How many strategies were attempted.
        attempts: usize,
        /// The last strategy's failure.
        last: Option<Box<FallbackError<E>>>,
    },
}

impl<E> FallbackError<E> {
    /// Returns true for the terminal all-strategies-failed error.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, FallbackError::Exhausted { .. })
    }

    /// Returns true for a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FallbackError::Timeout { .. })
    }

    /// The last underlying error, unwrapping the `Exhausted` shell.
    pub fn last_error(&self) -> Option<&FallbackError<E>> {
        match self {
            FallbackError::Exhausted { last, .. } => last.as_deref(),
            other => Some(other),
        }
    }

    /// Extracts the application error, unwrapping the `Exhausted` shell.
    pub fn into_application(self) -> Option<E> {
        match self {
            FallbackError::Application(e) => Some(e),
            FallbackError::Exhausted {
                last: Some(last), ..
            } => last.into_application(),
            _ => None,
        }
    }
}

impl<E> From<BreakerError<E>> for FallbackError<E> {
    fn from(err: BreakerError<E>) -> Self {
        match err {
            BreakerError::Open { service } => FallbackError::CircuitOpen { service },
            BreakerError::Timeout { after } => FallbackError::Timeout { after },
            BreakerError::Inner(e) => FallbackError::Application(e),
        }
    }
}
