//! Single-Flight Store
//!
//! Wraps any store so concurrent same-key operations hit it only once.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::flight::Group;
use crate::kv::{DynKv, Key, Kv, Value};

// == Single-Flight Store ==
/// Deduplicating wrapper around a store.
///
/// Concurrent `get`s of one key share a single underlying `get`; the same
/// holds for `set` and for `del`, each operation kind in its own group. Two
/// concurrent `set`s of the same key with different values therefore persist
/// only the value of whichever started the flight, and both callers see that
/// flight's outcome. This is meant to shield a backing store from identical
/// work, not to order conflicting writes.
pub struct SingleFlightKv<K, V> {
    inner: DynKv<K, V>,
    gets: Group<K, V>,
    sets: Group<K, ()>,
    dels: Group<K, ()>,
}

impl<K: Key, V: Value> SingleFlightKv<K, V> {
    /// Wraps `inner` with one flight group per operation.
    pub fn new(inner: impl Kv<K, V> + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            gets: Group::new(),
            sets: Group::new(),
            dels: Group::new(),
        }
    }

    /// Number of distinct (operation, key) calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.gets.in_flight() + self.sets.in_flight() + self.dels.in_flight()
    }
}

impl<K, V> fmt::Debug for SingleFlightKv<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlightKv")
            .field("gets", &self.gets)
            .field("sets", &self.sets)
            .field("dels", &self.dels)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<K: Key, V: Value> Kv<K, V> for SingleFlightKv<K, V> {
    async fn get(&self, key: &K) -> Result<V> {
        let inner = Arc::clone(&self.inner);
        let owned = key.clone();
        let (result, _) = self
            .gets
            .work(key, move || async move { inner.get(&owned).await })
            .await;
        result
    }

    async fn set(&self, key: &K, value: V) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let owned = key.clone();
        let (result, _) = self
            .sets
            .work(key, move || async move { inner.set(&owned, value).await })
            .await;
        result
    }

    async fn del(&self, key: &K) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let owned = key.clone();
        let (result, _) = self
            .dels
            .work(key, move || async move { inner.del(&owned).await })
            .await;
        result
    }
}
