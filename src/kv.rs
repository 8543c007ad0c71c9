//! Store Contracts
//!
//! The point-lookup (`Kv`) and batch (`BatchKv`) contracts every store and
//! composer satisfies, so that they can be stacked without knowing each
//! other's concrete types.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

// == Key / Value Bounds ==
/// Bounds required of a key: equality and a stable hash, plus what the async
/// composers need to move it across tasks.
pub trait Key: Eq + Hash + Clone + Send + Sync + 'static {}

impl<T> Key for T where T: Eq + Hash + Clone + Send + Sync + 'static {}

/// Bounds required of a value.
pub trait Value: Clone + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + Send + Sync + 'static {}

// == Point Store ==
/// A key-value store with point operations.
///
/// `get` reports an absent key as `KvError::NotFound`. `del` on an absent key
/// succeeds.
#[async_trait]
pub trait Kv<K: Key, V: Value>: Send + Sync {
    async fn get(&self, key: &K) -> Result<V>;

    async fn set(&self, key: &K, value: V) -> Result<()>;

    async fn del(&self, key: &K) -> Result<()>;
}

/// Shared, type-erased point store.
pub type DynKv<K, V> = Arc<dyn Kv<K, V>>;

#[async_trait]
impl<K: Key, V: Value, T: Kv<K, V> + ?Sized> Kv<K, V> for Arc<T> {
    async fn get(&self, key: &K) -> Result<V> {
        (**self).get(key).await
    }

    async fn set(&self, key: &K, value: V) -> Result<()> {
        (**self).set(key, value).await
    }

    async fn del(&self, key: &K) -> Result<()> {
        (**self).del(key).await
    }
}

// == Batch Store ==
/// A key-value store with bulk operations.
///
/// Keys missing from a `get_many` result are misses, not errors: the contract
/// does not promise every requested key comes back.
#[async_trait]
pub trait BatchKv<K: Key, V: Value>: Send + Sync {
    async fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>>;

    async fn set_many(&self, entries: &HashMap<K, V>) -> Result<()>;

    async fn del_many(&self, keys: &[K]) -> Result<()>;
}

/// Shared, type-erased batch store.
pub type DynBatchKv<K, V> = Arc<dyn BatchKv<K, V>>;

#[async_trait]
impl<K: Key, V: Value, T: BatchKv<K, V> + ?Sized> BatchKv<K, V> for Arc<T> {
    async fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>> {
        (**self).get_many(keys).await
    }

    async fn set_many(&self, entries: &HashMap<K, V>) -> Result<()> {
        (**self).set_many(entries).await
    }

    async fn del_many(&self, keys: &[K]) -> Result<()> {
        (**self).del_many(keys).await
    }
}
