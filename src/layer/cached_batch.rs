//! Point Cache over a Batch Source
//!
//! Serves bulk requests from a per-key cache, sending only the misses to a
//! batch-capable source in a single call.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{KvError, Result};
use crate::kv::{BatchKv, DynBatchKv, DynKv, Key, Kv, Value};
use crate::layer::batch::missing_keys;

/// A point-lookup cache in front of a [`BatchKv`] source.
///
/// Useful when the cache has no bulk API (or a slow one) but the source
/// does. Cache lookups and fills happen key by key; the source sees at most
/// one call per batch.
pub struct CachedBatchKv<K, V> {
    cache: DynKv<K, V>,
    source: DynBatchKv<K, V>,
}

impl<K: Key, V: Value> CachedBatchKv<K, V> {
    /// Puts the point store `cache` in front of the batch store `source`.
    pub fn new(cache: impl Kv<K, V> + 'static, source: impl BatchKv<K, V> + 'static) -> Self {
        Self {
            cache: Arc::new(cache),
            source: Arc::new(source),
        }
    }

    async fn invalidate(&self, keys: impl Iterator<Item = &K>) -> Result<()> {
        for key in keys {
            self.cache.del(key).await?;
        }
        Ok(())
    }
}

impl<K, V> fmt::Debug for CachedBatchKv<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedBatchKv").finish_non_exhaustive()
    }
}

#[async_trait]
impl<K: Key, V: Value> BatchKv<K, V> for CachedBatchKv<K, V> {
    async fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>> {
        let mut found = HashMap::with_capacity(keys.len());
        if keys.is_empty() {
            return Ok(found);
        }

        let mut looked_up = HashSet::with_capacity(keys.len());
        for key in keys {
            if !looked_up.insert(key) {
                continue;
            }
            match self.cache.get(key).await {
                Ok(value) => {
                    found.insert(key.clone(), value);
                }
                Err(KvError::NotFound) => {}
                Err(err) => return Err(err),
            }
        }

        let misses = missing_keys(keys, &found);
        if misses.is_empty() {
            return Ok(found);
        }

        let fetched = self.source.get_many(&misses).await?;
        debug!(missed = misses.len(), fetched = fetched.len(), "Point cache fill");
        for (key, value) in fetched {
            self.cache
                .set(&key, value.clone())
                .await
                .map_err(|err| KvError::Populate(Box::new(err)))?;
            found.insert(key, value);
        }
        Ok(found)
    }

    async fn set_many(&self, entries: &HashMap<K, V>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        self.source.set_many(entries).await?;
        self.invalidate(entries.keys()).await
    }

    async fn del_many(&self, keys: &[K]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        self.source.del_many(keys).await?;
        self.invalidate(keys.iter()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{journal, MockKv};

    type Mock = Arc<MockKv<u32, String>>;

    fn cached(cache: &Mock, source: &Mock) -> CachedBatchKv<u32, String> {
        CachedBatchKv::new(Arc::clone(cache), Arc::clone(source))
    }

    fn entries(pairs: &[(u32, &str)]) -> Vec<(u32, String)> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_misses_go_to_source_in_one_call() {
        let cache: Mock = Arc::new(MockKv::with_entries("cache", entries(&[(1, "c1")])));
        let source: Mock = Arc::new(MockKv::with_entries(
            "source",
            entries(&[(1, "s1"), (2, "s2"), (3, "s3")]),
        ));
        let kv = cached(&cache, &source);

        let result = kv.get_many(&[1, 2, 3, 4, 2]).await.unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[&1], "c1");
        assert_eq!(result[&2], "s2");
        assert_eq!(*source.get_many_calls.lock(), vec![vec![2, 3, 4]]);
        // Duplicate request keys are looked up once
        assert_eq!(cache.get_count(), 4);
        assert_eq!(cache.peek(&3), Some("s3".to_string()));
    }

    #[tokio::test]
    async fn test_full_hit_skips_source() {
        let cache: Mock = Arc::new(MockKv::with_entries("cache", entries(&[(1, "a")])));
        let source: Mock = Arc::new(MockKv::new("source"));
        let kv = cached(&cache, &source);

        assert_eq!(kv.get_many(&[1]).await.unwrap().len(), 1);
        assert!(source.get_many_calls.lock().is_empty());
        assert!(kv.get_many(&[]).await.unwrap().is_empty());
        assert_eq!(cache.get_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_failures_surface() {
        let cache: Mock = Arc::new(MockKv::new("cache"));
        cache.fail("get");
        let source: Mock = Arc::new(MockKv::with_entries("source", entries(&[(1, "a")])));
        let kv = cached(&cache, &source);
        assert!(matches!(kv.get_many(&[1]).await, Err(KvError::Backend(_))));

        let cache: Mock = Arc::new(MockKv::new("cache"));
        cache.fail("set");
        let kv = cached(&cache, &source);
        assert!(matches!(kv.get_many(&[1]).await, Err(KvError::Populate(_))));
    }

    #[tokio::test]
    async fn test_writes_hit_source_then_invalidate() {
        let calls = journal();
        let cache: Mock = Arc::new(
            MockKv::with_entries("cache", entries(&[(1, "old"), (2, "old")])).journaled(&calls),
        );
        let source: Mock = Arc::new(MockKv::new("source").journaled(&calls));
        let kv = cached(&cache, &source);

        let update: HashMap<u32, String> = entries(&[(1, "new")]).into_iter().collect();
        kv.set_many(&update).await.unwrap();
        kv.del_many(&[2]).await.unwrap();

        assert_eq!(
            *calls.lock(),
            vec!["source.set_many", "cache.del", "source.del_many", "cache.del"]
        );
        assert_eq!(cache.peek(&1), None);
        assert_eq!(cache.peek(&2), None);
    }

    #[tokio::test]
    async fn test_source_write_failure_keeps_cache() {
        let cache: Mock = Arc::new(MockKv::with_entries("cache", entries(&[(1, "old")])));
        let source: Mock = Arc::new(MockKv::new("source"));
        source.fail("del_many");
        let kv = cached(&cache, &source);

        assert!(kv.del_many(&[1]).await.is_err());
        assert_eq!(cache.del_count(), 0);
    }
}
