//! Map Store Module
//!
//! A single `HashMap` behind one reader-writer lock.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{KvError, Result};
use crate::kv::{BatchKv, Key, Kv, Value};

// == Map Store ==
/// Unbounded in-memory store guarded by a single `RwLock`.
///
/// Suitable as a source of truth in tests and demos, or as a small cache
/// layer where contention is not a concern.
#[derive(Debug)]
pub struct MapKv<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K: Key, V: Value> MapKv<K, V> {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().collect()),
        }
    }

    // == Length ==
    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K: Key, V: Value> Default for MapKv<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: Key, V: Value> Kv<K, V> for MapKv<K, V> {
    async fn get(&self, key: &K) -> Result<V> {
        self.entries.read().get(key).cloned().ok_or(KvError::NotFound)
    }

    async fn set(&self, key: &K, value: V) -> Result<()> {
        self.entries.write().insert(key.clone(), value);
        Ok(())
    }

    async fn del(&self, key: &K) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[async_trait]
impl<K: Key, V: Value> BatchKv<K, V> for MapKv<K, V> {
    async fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>> {
        let entries = self.entries.read();
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(key).map(|v| (key.clone(), v.clone())))
            .collect())
    }

    async fn set_many(&self, batch: &HashMap<K, V>) -> Result<()> {
        let mut entries = self.entries.write();
        for (key, value) in batch {
            entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn del_many(&self, keys: &[K]) -> Result<()> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_map_set_and_get() {
        let store = MapKv::new();
        store.set(&"key1", 1).await.unwrap();

        assert_eq!(store.get(&"key1").await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_map_get_missing_is_not_found() {
        let store: MapKv<&str, i32> = MapKv::new();
        assert!(matches!(store.get(&"missing").await, Err(KvError::NotFound)));
    }

    #[tokio::test]
    async fn test_map_del_absent_key_succeeds() {
        let store: MapKv<&str, i32> = MapKv::new();
        assert!(store.del(&"missing").await.is_ok());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_map_batch_get_omits_misses() {
        let store = MapKv::with_entries([(1, "a"), (3, "c")]);

        let got = store.get_many(&[1, 2, 3]).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[&1], "a");
        assert_eq!(got[&3], "c");
        assert!(!got.contains_key(&2));
    }

    #[tokio::test]
    async fn test_map_batch_set_and_del() {
        let store = MapKv::new();
        let batch: HashMap<i32, &str> = [(1, "a"), (2, "b")].into_iter().collect();

        store.set_many(&batch).await.unwrap();
        assert_eq!(store.len(), 2);

        store.del_many(&[1, 7]).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&2).await.unwrap(), "b");
    }
}
