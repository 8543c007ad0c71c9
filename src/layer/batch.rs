//! Batch Layer Store
//!
//! Bulk cache-aside: one cache round trip, one source round trip for the
//! misses, one cache fill.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{KvError, Result};
use crate::kv::{BatchKv, DynBatchKv, Key, Value};

// == Batch Layer Store ==
/// Batch counterpart of [`LayerKv`](super::LayerKv).
///
/// Writes reach the source first; the cache is then invalidated for every
/// written or deleted key.
pub struct BatchLayerKv<K, V> {
    cache: DynBatchKv<K, V>,
    source: DynBatchKv<K, V>,
}

impl<K: Key, V: Value> BatchLayerKv<K, V> {
    /// Starts a builder; a cache and a source must both be supplied.
    pub fn builder() -> BatchLayerKvBuilder<K, V> {
        BatchLayerKvBuilder::default()
    }
}

impl<K, V> fmt::Debug for BatchLayerKv<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchLayerKv").finish_non_exhaustive()
    }
}

// == Builder ==
/// Builder for [`BatchLayerKv`].
pub struct BatchLayerKvBuilder<K, V> {
    cache: Option<DynBatchKv<K, V>>,
    source: Option<DynBatchKv<K, V>>,
}

impl<K, V> Default for BatchLayerKvBuilder<K, V> {
    fn default() -> Self {
        Self {
            cache: None,
            source: None,
        }
    }
}

impl<K: Key, V: Value> BatchLayerKvBuilder<K, V> {
    /// Layer consulted first and filled with whatever the source returns.
    pub fn cache(mut self, cache: impl BatchKv<K, V> + 'static) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    /// Layer asked once per batch for the keys the cache lacked.
    pub fn source(mut self, source: impl BatchKv<K, V> + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Fails with `KvError::Config` if the cache or the source is missing.
    pub fn build(self) -> Result<BatchLayerKv<K, V>> {
        let cache = self
            .cache
            .ok_or_else(|| KvError::Config("batch layer store requires a cache".to_string()))?;
        let source = self
            .source
            .ok_or_else(|| KvError::Config("batch layer store requires a source".to_string()))?;

        Ok(BatchLayerKv { cache, source })
    }
}

/// Requested keys missing from `found`, first occurrence order, no repeats.
pub(crate) fn missing_keys<K: Key, V>(keys: &[K], found: &HashMap<K, V>) -> Vec<K> {
    let mut seen = HashSet::new();
    keys.iter()
        .filter(|key| !found.contains_key(*key) && seen.insert(*key))
        .cloned()
        .collect()
}

#[async_trait]
impl<K: Key, V: Value> BatchKv<K, V> for BatchLayerKv<K, V> {
    async fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut found = self.cache.get_many(keys).await?;
        let misses = missing_keys(keys, &found);
        if misses.is_empty() {
            return Ok(found);
        }

        let fetched = self.source.get_many(&misses).await?;
        debug!(
            requested = keys.len(),
            missed = misses.len(),
            fetched = fetched.len(),
            "Batch cache fill"
        );
        if fetched.is_empty() {
            return Ok(found);
        }

        self.cache
            .set_many(&fetched)
            .await
            .map_err(|err| KvError::Populate(Box::new(err)))?;
        found.extend(fetched);
        Ok(found)
    }

    async fn set_many(&self, entries: &HashMap<K, V>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        self.source.set_many(entries).await?;
        let keys: Vec<K> = entries.keys().cloned().collect();
        self.cache.del_many(&keys).await
    }

    async fn del_many(&self, keys: &[K]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        self.source.del_many(keys).await?;
        self.cache.del_many(keys).await
    }
}
