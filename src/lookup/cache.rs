//! Lookup result caching.
//!
//! Entries are never evicted. Staleness is judged at read time against the
//! TTL, and an expired entry stays in place until a newer fetch overwrites it
//! so it can still be served when the upstream is down.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// A cached value and when it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: SystemTime,
}

impl<T> CacheEntry<T> {
    /// Time since the fetch. A `fetched_at` in the future counts as age zero.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.fetched_at).unwrap_or_default()
    }

    pub fn is_fresh(&self, now: SystemTime, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

/// A thread-safe cache keyed by composite lookup key.
#[derive(Debug, Clone)]
pub struct LookupCache<T> {
    inner: Arc<DashMap<String, CacheEntry<T>>>,
    ttl: Duration,
}

impl<T: Clone> LookupCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Entry for `key`, fresh or not.
    pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    /// Entry for `key` only if it is still inside the TTL at `now`.
    pub fn get_fresh(&self, key: &str, now: SystemTime) -> Option<CacheEntry<T>> {
        self.get(key).filter(|entry| entry.is_fresh(now, self.ttl))
    }

    /// Store `value`, replacing any previous entry for `key`.
    pub fn insert(&self, key: impl Into<String>, value: T, fetched_at: SystemTime) {
        self.inner.insert(key.into(), CacheEntry { value, fetched_at });
    }

    pub fn count(&self) -> usize {
        self.inner.len()
    }

    /// `(fresh, stale)` entry counts at `now`.
    pub fn get_summary(&self, now: SystemTime) -> (usize, usize) {
        let mut fresh = 0;
        let mut stale = 0;
        for r in self.inner.iter() {
            if r.value().is_fresh(now, self.ttl) {
                fresh += 1;
            } else {
                stale += 1;
            }
        }
        (fresh, stale)
    }
}
