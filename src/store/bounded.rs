//! Bounded Store Module
//!
//! Capacity- and time-bounded store combining a HashMap with an eviction
//! tracker and per-entry TTL.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{KvError, Result};
use crate::kv::{BatchKv, Key, Kv, Value};
use crate::store::{CacheEntry, CacheStats, EvictionPolicy, EvictionTracker, TtlPolicy};

/// Callback invoked with every entry evicted for capacity.
pub type EvictFn<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

// == Bounded Config ==
/// Construction parameters for [`BoundedKv`].
pub struct BoundedConfig<K, V> {
    /// Maximum number of entries; must be non-zero
    pub capacity: usize,
    /// Which entry is evicted when full
    pub policy: EvictionPolicy,
    /// Expiry applied on each write
    pub ttl: TtlPolicy<K>,
    /// Called outside the store lock for each capacity eviction
    pub on_evict: Option<EvictFn<K, V>>,
}

impl<K, V> BoundedConfig<K, V> {
    /// LRU, no expiry, no eviction callback.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            policy: EvictionPolicy::default(),
            ttl: TtlPolicy::Never,
            on_evict: None,
        }
    }

    /// Replacement order used once the store is full.
    pub fn policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Lifetime given to each written entry.
    pub fn ttl(mut self, ttl: TtlPolicy<K>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Observes entries dropped for capacity. Expired entries are not reported.
    pub fn on_evict<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.on_evict = Some(Arc::new(f));
        self
    }
}

// == Inner State ==
struct BoundedState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    tracker: EvictionTracker<K>,
    stats: CacheStats,
}

impl<K: Key, V: Value> BoundedState<K, V> {
    fn lookup(&mut self, key: &K) -> Option<V> {
        let expired = match self.entries.get(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired(),
        };

        if expired {
            self.entries.remove(key);
            self.tracker.remove(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            self.stats.set_total_entries(self.entries.len());
            return None;
        }

        self.stats.record_hit();
        self.tracker.touch(key);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Stores `value` and returns the entry evicted to make room, if any.
    fn insert(
        &mut self,
        key: &K,
        value: V,
        entry_ttl: Option<Duration>,
        capacity: usize,
    ) -> Option<(K, V)> {
        let mut evicted = None;

        let full = !self.entries.contains_key(key) && self.entries.len() >= capacity;
        if full && !self.drop_one_expired() {
            if let Some(victim) = self.tracker.evict() {
                if let Some(entry) = self.entries.remove(&victim) {
                    self.stats.record_eviction();
                    evicted = Some((victim, entry.value));
                }
            }
        }

        self.entries.insert(key.clone(), CacheEntry::new(value, entry_ttl));
        self.tracker.insert(key);
        self.stats.set_total_entries(self.entries.len());
        evicted
    }

    /// Frees a slot held by a dead entry so a full store does not evict a
    /// live one. Returns false when every entry is still live.
    fn drop_one_expired(&mut self) -> bool {
        let now = Instant::now();
        let expired = self
            .entries
            .iter()
            .find(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone());

        match expired {
            Some(key) => {
                self.entries.remove(&key);
                self.tracker.remove(&key);
                self.stats.record_expirations(1);
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, key: &K) {
        if self.entries.remove(key).is_some() {
            self.tracker.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
    }
}

// == Bounded Store ==
/// In-memory store holding at most `capacity` live entries.
///
/// Expired entries read as `NotFound` and are dropped lazily on access, or
/// eagerly by [`purge_expired`](Self::purge_expired).
pub struct BoundedKv<K, V> {
    state: Mutex<BoundedState<K, V>>,
    capacity: usize,
    ttl: TtlPolicy<K>,
    on_evict: Option<EvictFn<K, V>>,
}

impl<K: Key, V: Value> BoundedKv<K, V> {
    // == Constructor ==
    /// Creates a store from `config`.
    ///
    /// Fails with `KvError::Config` if the capacity is zero.
    pub fn new(config: BoundedConfig<K, V>) -> Result<Self> {
        if config.capacity == 0 {
            return Err(KvError::Config(
                "bounded store capacity must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            state: Mutex::new(BoundedState {
                entries: HashMap::with_capacity(config.capacity),
                tracker: EvictionTracker::new(config.policy),
                stats: CacheStats::new(),
            }),
            capacity: config.capacity,
            ttl: config.ttl,
            on_evict: config.on_evict,
        })
    }

    /// LRU store with no expiry.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::new(BoundedConfig::new(capacity))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    // == Time To Live ==
    /// Remaining lifetime of `key`, `None` if it never expires.
    ///
    /// Fails with `NotFound` if the key is absent or already expired. Does
    /// not count as a read for the stats or the eviction order.
    pub fn ttl(&self, key: &K) -> Result<Option<Duration>> {
        let state = self.state.lock();
        match state.entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(entry.ttl_remaining()),
            _ => Err(KvError::NotFound),
        }
    }

    // == Stats ==
    /// Returns a snapshot of the store's counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }

    // == Purge Expired ==
    /// Removes every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();

        let expired: Vec<K> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.entries.remove(key);
            state.tracker.remove(key);
        }

        state.stats.record_expirations(expired.len());
        let remaining = state.entries.len();
        state.stats.set_total_entries(remaining);
        expired.len()
    }

    fn store(&self, key: &K, value: V) {
        let entry_ttl = self.ttl.ttl_for(key);
        let evicted = self.state.lock().insert(key, value, entry_ttl, self.capacity);
        self.notify_evicted(evicted.into_iter());
    }

    fn notify_evicted(&self, evicted: impl Iterator<Item = (K, V)>) {
        for (key, value) in evicted {
            debug!("Bounded store evicted an entry to stay within capacity");
            if let Some(on_evict) = &self.on_evict {
                on_evict(&key, &value);
            }
        }
    }
}

impl<K, V> fmt::Debug for BoundedKv<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedKv")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<K: Key, V: Value> Kv<K, V> for BoundedKv<K, V> {
    async fn get(&self, key: &K) -> Result<V> {
        self.state.lock().lookup(key).ok_or(KvError::NotFound)
    }

    async fn set(&self, key: &K, value: V) -> Result<()> {
        self.store(key, value);
        Ok(())
    }

    async fn del(&self, key: &K) -> Result<()> {
        self.state.lock().remove(key);
        Ok(())
    }
}

#[async_trait]
impl<K: Key, V: Value> BatchKv<K, V> for BoundedKv<K, V> {
    async fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>> {
        let mut state = self.state.lock();
        Ok(keys
            .iter()
            .filter_map(|key| state.lookup(key).map(|value| (key.clone(), value)))
            .collect())
    }

    async fn set_many(&self, entries: &HashMap<K, V>) -> Result<()> {
        let mut evicted = Vec::new();
        {
            let mut state = self.state.lock();
            for (key, value) in entries {
                let entry_ttl = self.ttl.ttl_for(key);
                evicted.extend(state.insert(key, value.clone(), entry_ttl, self.capacity));
            }
        }
        self.notify_evicted(evicted.into_iter());
        Ok(())
    }

    async fn del_many(&self, keys: &[K]) -> Result<()> {
        let mut state = self.state.lock();
        for key in keys {
            state.remove(key);
        }
        Ok(())
    }
}
