//! Expiring in-memory cache with an explicit lifecycle
//!
//! Owners construct it and share it through `Arc`. Expired entries are
//! dropped lazily by [`TtlCache::get`] and in bulk by [`TtlCache::sweep`],
//! which `insert` also runs once per sweep interval so keys that are never
//! read again do not accumulate.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    last_sweep: Instant,
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    sweep_interval: Duration,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Cache that sweeps on insert at most once per `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self::with_sweep_interval(ttl, ttl)
    }

    pub fn with_sweep_interval(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            ttl,
            sweep_interval,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or replace, restarting the entry's expiry
    pub fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let mut inner = self.lock();
        if now.duration_since(inner.last_sweep) >= self.sweep_interval {
            let removed = sweep_locked(&mut inner, now);
            if removed > 0 {
                debug!(removed, remaining = inner.entries.len(), "Swept expired cache entries");
            }
        }
        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Clone of a live entry; an expired entry is removed and `None` returned
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        match inner.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                inner.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn sweep(&self) -> usize {
        sweep_locked(&mut self.lock(), Instant::now())
    }

    /// Entries currently held, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn sweep_locked<K, V>(inner: &mut Inner<K, V>, now: Instant) -> usize {
    let before = inner.entries.len();
    inner.entries.retain(|_, entry| entry.expires_at > now);
    inner.last_sweep = now;
    before - inner.entries.len()
}
