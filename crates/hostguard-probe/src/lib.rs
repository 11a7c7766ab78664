//! Reachability probing.
//!
//! A probe is the cheap pre-filter run before any expensive remote call: a
//! bounded TCP connection attempt that answers "is anything listening
//! there?" and nothing more. All failure modes — refusal, timeout, name
//! resolution, any I/O error — normalize to `false`; probing never fails.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hostguard_probe::probe;
//! use std::time::Duration;
//!
//! # async fn example() {
//! if probe("rds-01", 3389, Duration::from_secs(2)).await {
//!     // host is worth querying
//! }
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;

/// Attempts a TCP connection to `host:port`, resolving within `timeout`.
///
/// Returns `true` strictly on a successful connection. The connection is
/// closed immediately — this is a liveness check, not a reusable stream —
/// and nothing is ever propagated as an error.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        // Connection error or timeout: unreachable either way.
        Ok(Err(_)) | Err(_) => false,
    }
}

/// Trait for checking whether a host is reachable.
///
/// The collector and monitor take a prober through this seam so tests can
/// substitute a canned answer. Closures of the shape
/// `Fn(&str) -> impl Future<Output = bool>` implement it via the blanket
/// impl.
pub trait Prober: Send + Sync {
    /// Probe the given host, resolving `true` if it is reachable.
    fn probe(&self, host: &str) -> impl Future<Output = bool> + Send;
}

impl<F, Fut> Prober for F
where
    F: Fn(&str) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    fn probe(&self, host: &str) -> impl Future<Output = bool> + Send {
        self(host)
    }
}

/// Production [`Prober`] probing a fixed TCP port with a fixed timeout.
#[derive(Debug, Clone)]
pub struct TcpProber {
    port: u16,
    timeout: Duration,
}

impl TcpProber {
    /// Creates a prober targeting `port` with the given per-probe timeout.
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

impl Default for TcpProber {
    /// RDP endpoint, two-second budget.
    fn default() -> Self {
        Self::new(3389, Duration::from_secs(2))
    }
}

impl Prober for TcpProber {
    fn probe(&self, host: &str) -> impl Future<Output = bool> + Send {
        probe_owned(host.to_string(), self.port, self.timeout)
    }
}

async fn probe_owned(host: String, port: u16, timeout: Duration) -> bool {
    probe(&host, port, timeout).await
}
