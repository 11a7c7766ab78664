use crate::runner::RunnerError;
use thiserror::Error;

/// Errors from a single host's collection.
///
/// All variants are scoped to one host; none of them should abort a
/// monitoring pass over other hosts.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The reachability probe failed; no remote command was attempted.
    #[error("host {host} is unreachable")]
    HostUnreachable {
        /// Host that failed the probe.
        host: String,
    },

    /// The remote command ran (or timed out) and did not produce a reply.
    #[error("remote command failed on {host}: {source}")]
    Command {
        /// Host the command targeted.
        host: String,
        /// Underlying runner failure.
        source: RunnerError,
    },

    /// The stats reply was not a usable document.
    #[error("stats reply from {host} did not parse: {detail}")]
    MalformedStats {
        /// Host the reply came from.
        host: String,
        /// Parser diagnostic.
        detail: String,
    },
}

impl CollectorError {
    /// Returns the host this error concerns.
    pub fn host(&self) -> &str {
        match self {
            CollectorError::HostUnreachable { host }
            | CollectorError::Command { host, .. }
            | CollectorError::MalformedStats { host, .. } => host,
        }
    }

    /// Returns true if the host never answered the probe.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, CollectorError::HostUnreachable { .. })
    }
}
