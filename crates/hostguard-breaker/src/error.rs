use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute).
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit open for {service}; call rejected")]
    Open {
        /// Service the breaker guards.
        service: String,
    },

    /// The operation did not settle within its deadline.
    #[error("operation timed out after {after:?}")]
    Timeout {
        /// Deadline that elapsed.
        after: Duration,
    },

    /// The operation itself failed.
    #[error("service error: {0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the circuit rejected the call.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// Returns true if the call was cut off by its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }

    /// Returns the operation's own error, if that is what this is.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}
