//! The remote-command seam.
//!
//! How commands actually reach a host (WinRM, SSH, an agent, a local shell
//! in tests) is outside this crate. The collector only needs "run this
//! query on that host, give me the reply text".

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The remote queries the collector knows how to interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSpec {
    /// List interactive sessions (tabular text reply).
    SessionList,
    /// Query CPU, memory, and disk figures (JSON reply).
    SystemStats,
}

/// Failures of the remote command capability.
///
/// All of these are soft failures for the host in question — they degrade
/// that host's collection, never the process.
#[derive(Debug, Clone, Error)]
pub enum RunnerError {
    /// The command did not complete within its deadline.
    #[error("remote command timed out after {after:?}")]
    Timeout {
        /// Deadline that elapsed.
        after: Duration,
    },

    /// The remote side refused the credentials or the operation.
    #[error("remote command not authorized: {0}")]
    Denied(String),

    /// The command ran and reported an error.
    #[error("remote command failed: {0}")]
    Failed(String),
}

/// Trait for executing a remote query against a host.
///
/// Closures of the shape `Fn(&str, CommandSpec) -> impl Future<Output =
/// Result<String, RunnerError>>` implement it via the blanket impl, which
/// is what tests use.
pub trait CommandRunner: Send + Sync {
    /// Runs `command` against `host`, resolving to the raw reply text.
    fn run(
        &self,
        host: &str,
        command: CommandSpec,
    ) -> impl Future<Output = Result<String, RunnerError>> + Send;
}

impl<F, Fut> CommandRunner for F
where
    F: Fn(&str, CommandSpec) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, RunnerError>> + Send,
{
    fn run(
        &self,
        host: &str,
        command: CommandSpec,
    ) -> impl Future<Output = Result<String, RunnerError>> + Send {
        self(host, command)
    }
}
