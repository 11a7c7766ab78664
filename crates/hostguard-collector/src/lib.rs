//! Session and system-stats collection for remote hosts.
//!
//! The collector is the expensive half of a monitoring pass. It always
//! probes first: querying a dead host over the remote command channel can
//! hang for the full command timeout, so an unreachable host short-circuits
//! to [`CollectorError::HostUnreachable`] without ever invoking the runner.
//!
//! On reachable hosts it issues two remote queries through the
//! [`CommandRunner`] seam — a system-stats query whose reply is a JSON
//! document, and a session listing whose reply is locale-variable tabular
//! text. Partial data is the norm, not an error: missing metrics default to
//! zero, garbled session lines are logged and skipped, and a failed session
//! listing degrades to an empty list while the stats remain usable.

mod error;
mod runner;
mod sessions;
mod stats;

pub use error::CollectorError;
pub use runner::{CommandRunner, CommandSpec, RunnerError};
pub use sessions::{parse_session_listing, SessionRecord};
pub use stats::{parse_stats, DiskStats, HostStats, MemoryStats};

use hostguard_probe::Prober;

/// One host's worth of collected data.
#[derive(Debug, Clone)]
pub struct HostSnapshot {
    /// Host the data came from.
    pub host: String,
    /// Numeric system stats.
    pub stats: HostStats,
    /// Interactive sessions parsed from the listing reply.
    pub sessions: Vec<SessionRecord>,
}

/// Collects stats and sessions from remote hosts.
pub struct Collector<P, R> {
    prober: P,
    runner: R,
}

impl<P, R> Collector<P, R>
where
    P: Prober,
    R: CommandRunner,
{
    /// Creates a collector over the given prober and command runner.
    pub fn new(prober: P, runner: R) -> Self {
        Self { prober, runner }
    }

    /// Collects a [`HostSnapshot`] for `host`.
    ///
    /// Probes first and short-circuits on an unreachable host. A stats
    /// failure fails the host; a session-listing failure degrades to an
    /// empty session list, since the stats alone are still actionable.
    pub async fn collect(&self, host: &str) -> Result<HostSnapshot, CollectorError> {
        if !self.prober.probe(host).await {
            return Err(CollectorError::HostUnreachable {
                host: host.to_string(),
            });
        }

        let stats_reply = self
            .runner
            .run(host, CommandSpec::SystemStats)
            .await
            .map_err(|source| CollectorError::Command {
                host: host.to_string(),
                source,
            })?;

        let stats = parse_stats(&stats_reply).map_err(|detail| CollectorError::MalformedStats {
            host: host.to_string(),
            detail,
        })?;

        let sessions = match self.runner.run(host, CommandSpec::SessionList).await {
            Ok(reply) => parse_session_listing(host, &reply),
            Err(err) => {
                tracing::warn!(host, error = %err, "session listing failed, keeping stats");
                Vec::new()
            }
        };

        Ok(HostSnapshot {
            host: host.to_string(),
            stats,
            sessions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const STATS_REPLY: &str = r#"{
        "cpu_percent": 42.0,
        "memory": { "total_gb": 32.0, "used_gb": 8.0, "free_gb": 24.0, "used_percent": 25.0 },
        "disks": [ { "volume": "C:", "total_gb": 100.0, "used_gb": 40.0, "free_gb": 60.0, "used_percent": 40.0 } ]
    }"#;

    const SESSION_REPLY: &str = "\
 USERNAME              SESSIONNAME        ID  STATE   IDLE TIME  LOGON TIME\n\
 jsmith                rdp-tcp#12          2  Active          .  18/07/2025 09:15\n";

    fn runner_ok() -> impl CommandRunner {
        |_host: &str, command: CommandSpec| async move {
            match command {
                CommandSpec::SystemStats => Ok(STATS_REPLY.to_string()),
                CommandSpec::SessionList => Ok(SESSION_REPLY.to_string()),
            }
        }
    }

    #[tokio::test]
    async fn unreachable_host_short_circuits_without_running_commands() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&invocations);

        let runner = move |_host: &str, _command: CommandSpec| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(String::new())
            }
        };

        let collector = Collector::new(|_host: &str| async { false }, runner);
        let err = collector.collect("rds-02").await.unwrap_err();

        assert!(matches!(err, CollectorError::HostUnreachable { .. }));
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reachable_host_yields_stats_and_sessions() {
        let collector = Collector::new(|_host: &str| async { true }, runner_ok());
        let snapshot = collector.collect("rds-01").await.unwrap();

        assert_eq!(snapshot.host, "rds-01");
        assert_eq!(snapshot.stats.cpu_percent, 42.0);
        assert_eq!(snapshot.sessions.len(), 1);
        assert_eq!(snapshot.sessions[0].username, "jsmith");
    }

    #[tokio::test]
    async fn session_listing_failure_degrades_to_empty() {
        let runner = |_host: &str, command: CommandSpec| async move {
            match command {
                CommandSpec::SystemStats => Ok(STATS_REPLY.to_string()),
                CommandSpec::SessionList => Err(RunnerError::Denied("access denied".into())),
            }
        };

        let collector = Collector::new(|_host: &str| async { true }, runner);
        let snapshot = collector.collect("rds-01").await.unwrap();

        assert_eq!(snapshot.stats.cpu_percent, 42.0);
        assert!(snapshot.sessions.is_empty());
    }

    #[tokio::test]
    async fn stats_failure_fails_the_host() {
        let runner = |_host: &str, command: CommandSpec| async move {
            match command {
                CommandSpec::SystemStats => Err(RunnerError::Timeout {
                    after: std::time::Duration::from_secs(10),
                }),
                CommandSpec::SessionList => Ok(String::new()),
            }
        };

        let collector = Collector::new(|_host: &str| async { true }, runner);
        let err = collector.collect("rds-01").await.unwrap_err();

        assert!(matches!(err, CollectorError::Command { .. }));
    }

    #[tokio::test]
    async fn garbage_stats_reply_is_malformed() {
        let runner = |_host: &str, command: CommandSpec| async move {
            match command {
                CommandSpec::SystemStats => Ok("not json at all".to_string()),
                CommandSpec::SessionList => Ok(String::new()),
            }
        };

        let collector = Collector::new(|_host: &str| async { true }, runner);
        let err = collector.collect("rds-01").await.unwrap_err();

        assert!(matches!(err, CollectorError::MalformedStats { .. }));
    }
}
