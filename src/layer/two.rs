//! Two-Layer Store
//!
//! Cache-aside reads and source-first writes over a cache and a source of truth.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{KvError, Result};
use crate::kv::{DynKv, Key, Kv, Value};

// == Layer Store ==
/// A fast cache in front of an authoritative source.
///
/// Reads try the cache first and fill it from the source on a miss. Writes
/// always reach the source before the cache is touched, so the cache never
/// holds a value the source rejected. After a successful source write the
/// cache entry is invalidated, or overwritten when write-through is enabled.
pub struct LayerKv<K, V> {
    cache: DynKv<K, V>,
    source: DynKv<K, V>,
    write_through: bool,
}

impl<K: Key, V: Value> LayerKv<K, V> {
    /// Starts a builder; a cache and a source must both be supplied.
    pub fn builder() -> LayerKvBuilder<K, V> {
        LayerKvBuilder::default()
    }

    /// True if `set` writes the new value into the cache.
    pub fn write_through(&self) -> bool {
        self.write_through
    }
}

impl<K, V> fmt::Debug for LayerKv<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerKv")
            .field("write_through", &self.write_through)
            .finish_non_exhaustive()
    }
}

// == Builder ==
/// Builder for [`LayerKv`]; `build` fails if either layer is missing.
pub struct LayerKvBuilder<K, V> {
    cache: Option<DynKv<K, V>>,
    source: Option<DynKv<K, V>>,
    write_through: bool,
}

impl<K, V> Default for LayerKvBuilder<K, V> {
    fn default() -> Self {
        Self {
            cache: None,
            source: None,
            write_through: false,
        }
    }
}

impl<K: Key, V: Value> LayerKvBuilder<K, V> {
    /// The near, fast layer read first and populated on a miss.
    pub fn cache(mut self, cache: impl Kv<K, V> + 'static) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    /// The authoritative layer. Writes reach it before the cache.
    pub fn source(mut self, source: impl Kv<K, V> + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Write new values into the cache on `set` instead of invalidating.
    pub fn write_through(mut self, enabled: bool) -> Self {
        self.write_through = enabled;
        self
    }

    /// Fails with `KvError::Config` if the cache or the source is missing.
    pub fn build(self) -> Result<LayerKv<K, V>> {
        let cache = self
            .cache
            .ok_or_else(|| KvError::Config("layer store requires a cache".to_string()))?;
        let source = self
            .source
            .ok_or_else(|| KvError::Config("layer store requires a source".to_string()))?;

        Ok(LayerKv {
            cache,
            source,
            write_through: self.write_through,
        })
    }
}

#[async_trait]
impl<K: Key, V: Value> Kv<K, V> for LayerKv<K, V> {
    async fn get(&self, key: &K) -> Result<V> {
        match self.cache.get(key).await {
            Ok(value) => return Ok(value),
            Err(KvError::NotFound) => {}
            Err(err) => return Err(err),
        }

        let value = self.source.get(key).await?;
        debug!("Cache miss filled from source");

        self.cache
            .set(key, value.clone())
            .await
            .map_err(|err| KvError::Populate(Box::new(err)))?;
        Ok(value)
    }

    async fn set(&self, key: &K, value: V) -> Result<()> {
        if self.write_through {
            self.source.set(key, value.clone()).await?;
            self.cache.set(key, value).await
        } else {
            self.source.set(key, value).await?;
            self.cache.del(key).await
        }
    }

    async fn del(&self, key: &K) -> Result<()> {
        self.source.del(key).await?;
        self.cache.del(key).await
    }
}
