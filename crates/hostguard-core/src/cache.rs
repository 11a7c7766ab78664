//! Bounded TTL cache with insertion-order eviction.
//!
//! Shared by the circuit breaker (cached-response fallback) and the fallback
//! orchestrator (cache-first and cached-response strategies). Entries carry
//! their own expiry; when the cache is at capacity the oldest *inserted*
//! entry is evicted, regardless of access pattern — recency never matters
//! for fallback material, age does.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// A capacity-bounded key/value cache where every entry expires after its
/// own time-to-live.
///
/// Reads of expired entries behave as misses (and drop the entry); writes
/// replace whole entries. Expired entries that are never read again are
/// reclaimed by [`sweep`](TtlCache::sweep), which callers run periodically
/// rather than on every access.
pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    order: VecDeque<K>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V> TtlCache<K, V> {
    /// Creates a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Stores `value` under `key`, expiring after `ttl`.
    ///
    /// Replaces any existing entry for the key (keeping its insertion-order
    /// slot). At capacity, the oldest-inserted entry is evicted first; the
    /// evicted value is returned.
    pub fn insert(&mut self, key: K, value: V, ttl: Duration) -> Option<V> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };

        if self.entries.contains_key(&key) {
            return self.entries.insert(key, entry).map(|e| e.value);
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.order
                .pop_front()
                .and_then(|oldest| self.entries.remove(&oldest))
                .map(|e| e.value)
        } else {
            None
        };

        self.order.push_back(key.clone());
        self.entries.insert(key, entry);
        evicted
    }

    /// Returns a clone-free reference to the value if present and fresh.
    ///
    /// An expired entry is removed and reported as a miss; expiry is never
    /// an error.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| &e.value)
    }

    /// Removes an entry, returning its value if it was present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.order.retain(|k| k != key);
        self.entries.remove(key).map(|e| e.value)
    }

    /// Removes every expired entry, returning how many were dropped.
    pub fn sweep(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        self.order.retain(|k| self.entries.contains_key(k));
        let swept = before - self.entries.len();

        #[cfg(feature = "tracing")]
        if swept > 0 {
            tracing::debug!(swept, remaining = self.entries.len(), "cache sweep");
        }

        swept
    }

    /// Current number of entries, expired ones included until swept or read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
