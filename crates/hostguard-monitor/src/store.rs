//! Session persistence seam.
//!
//! The monitor replaces the full session set every pass — no incremental
//! diffing. Whatever backs the store must make that replacement atomic:
//! readers see the complete old set or the complete new set, never a
//! partial mix.

use hostguard_collector::SessionRecord;
use std::future::Future;
use tokio::sync::RwLock;

/// Store receiving the session set collected on each monitoring pass.
pub trait SessionStore: Send + Sync {
    /// Atomically replaces all stored sessions with `sessions`.
    fn replace_all(&self, sessions: Vec<SessionRecord>) -> impl Future<Output = ()> + Send;

    /// Returns the current session set.
    fn all(&self) -> impl Future<Output = Vec<SessionRecord>> + Send;
}

impl<S: SessionStore> SessionStore for std::sync::Arc<S> {
    fn replace_all(&self, sessions: Vec<SessionRecord>) -> impl Future<Output = ()> + Send {
        (**self).replace_all(sessions)
    }

    fn all(&self) -> impl Future<Output = Vec<SessionRecord>> + Send {
        (**self).all()
    }
}

/// In-memory [`SessionStore`] swapping the whole vector under one write
/// lock.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<Vec<SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    async fn replace_all(&self, sessions: Vec<SessionRecord>) {
        *self.sessions.write().await = sessions;
    }

    async fn all(&self) -> Vec<SessionRecord> {
        self.sessions.read().await.clone()
    }
}
