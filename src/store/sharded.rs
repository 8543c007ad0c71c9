//! Sharded Store Module
//!
//! Concurrent map split into independently locked shards.
//!
//! # Design
//!
//! - Each shard owns its own `RwLock`, so writers to different shards never
//!   contend
//! - Power-of-2 shard count turns shard selection into a bitmask
//! - One `RandomState` per store, fixed for its lifetime, so a key always
//!   lands in the same shard

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{KvError, Result};
use crate::kv::{BatchKv, Key, Kv, Value};

/// Shard count used when zero is requested.
pub const DEFAULT_SHARD_COUNT: usize = 32;

// == Shard ==
/// One lock-partitioned slice of the key space.
#[derive(Debug)]
struct Shard<K, V> {
    map: RwLock<HashMap<K, V>>,
}

impl<K, V> Shard<K, V> {
    fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }
}

// == Sharded Store ==
/// In-memory store partitioned into `2^n` shards.
#[derive(Debug)]
pub struct ShardedKv<K, V> {
    shards: Box<[Shard<K, V>]>,
    hasher: RandomState,
    mask: u64,
}

impl<K: Key, V: Value> ShardedKv<K, V> {
    // == Constructor ==
    /// Creates a store with `shard_count` shards.
    ///
    /// Zero selects [`DEFAULT_SHARD_COUNT`]; any other value is rounded up to
    /// the next power of two.
    pub fn new(shard_count: usize) -> Self {
        let count = normalize_shard_count(shard_count);
        let shards = (0..count).map(|_| Shard::new()).collect();

        Self {
            shards,
            hasher: RandomState::new(),
            mask: (count - 1) as u64,
        }
    }

    /// Number of shards after normalization.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard owning `key`.
    pub fn shard_index(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) & self.mask) as usize
    }

    fn shard(&self, key: &K) -> &Shard<K, V> {
        &self.shards[self.shard_index(key)]
    }

    // == Length ==
    /// Total number of entries across all shards.
    ///
    /// Each shard is read under its own lock, one after another; with
    /// concurrent writers the sum may describe a state that never existed
    /// all at once.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.map.read().len()).sum()
    }

    /// Returns true if every shard is empty.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.map.read().is_empty())
    }

    /// Groups `keys` by owning shard index.
    fn partition<'a, I>(&self, keys: I) -> HashMap<usize, Vec<&'a K>>
    where
        I: IntoIterator<Item = &'a K>,
    {
        let mut groups: HashMap<usize, Vec<&'a K>> = HashMap::new();
        for key in keys {
            groups.entry(self.shard_index(key)).or_default().push(key);
        }
        groups
    }
}

impl<K: Key, V: Value> Default for ShardedKv<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_SHARD_COUNT)
    }
}

/// Rounds a requested shard count to the power of two actually used.
pub fn normalize_shard_count(requested: usize) -> usize {
    if requested == 0 {
        DEFAULT_SHARD_COUNT
    } else {
        requested.next_power_of_two()
    }
}

#[async_trait]
impl<K: Key, V: Value> Kv<K, V> for ShardedKv<K, V> {
    async fn get(&self, key: &K) -> Result<V> {
        self.shard(key)
            .map
            .read()
            .get(key)
            .cloned()
            .ok_or(KvError::NotFound)
    }

    async fn set(&self, key: &K, value: V) -> Result<()> {
        self.shard(key).map.write().insert(key.clone(), value);
        Ok(())
    }

    async fn del(&self, key: &K) -> Result<()> {
        self.shard(key).map.write().remove(key);
        Ok(())
    }
}

#[async_trait]
impl<K: Key, V: Value> BatchKv<K, V> for ShardedKv<K, V> {
    async fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>> {
        let mut found = HashMap::with_capacity(keys.len());
        for (idx, group) in self.partition(keys) {
            let map = self.shards[idx].map.read();
            for key in group {
                if let Some(value) = map.get(key) {
                    found.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(found)
    }

    async fn set_many(&self, entries: &HashMap<K, V>) -> Result<()> {
        for (idx, group) in self.partition(entries.keys()) {
            let mut map = self.shards[idx].map.write();
            for key in group {
                map.insert(key.clone(), entries[key].clone());
            }
        }
        Ok(())
    }

    async fn del_many(&self, keys: &[K]) -> Result<()> {
        for (idx, group) in self.partition(keys) {
            let mut map = self.shards[idx].map.write();
            for key in group {
                map.remove(key);
            }
        }
        Ok(())
    }
}
