//! Recording store for unit tests.
//!
//! Backed by a `MapKv`; counts every call, keeps batch payloads, can inject
//! failures and delays, and appends `"<name>.<op>"` to an optional shared
//! journal so tests can assert cross-store call order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;

use crate::error::{KvError, Result};
use crate::kv::{BatchKv, Key, Kv, Value};
use crate::store::MapKv;

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub struct MockKv<K, V> {
    name: &'static str,
    inner: MapKv<K, V>,
    journal: Option<Journal>,
    delay: Option<Duration>,
    failing: Mutex<Vec<&'static str>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
    dels: AtomicUsize,
    pub set_calls: Mutex<Vec<(K, V)>>,
    pub get_many_calls: Mutex<Vec<Vec<K>>>,
    pub set_many_calls: Mutex<Vec<HashMap<K, V>>>,
    pub del_many_calls: Mutex<Vec<Vec<K>>>,
}

impl<K: Key, V: Value> MockKv<K, V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: MapKv::new(),
            journal: None,
            delay: None,
            failing: Mutex::new(Vec::new()),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            dels: AtomicUsize::new(0),
            set_calls: Mutex::new(Vec::new()),
            get_many_calls: Mutex::new(Vec::new()),
            set_many_calls: Mutex::new(Vec::new()),
            del_many_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_entries(name: &'static str, entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            inner: MapKv::with_entries(entries),
            ..Self::new(name)
        }
    }

    pub fn journaled(mut self, journal: &Journal) -> Self {
        self.journal = Some(Arc::clone(journal));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes every subsequent call of `op` ("get", "set", "del",
    /// "get_many", "set_many", "del_many") fail with a backend error.
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().push(op);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn del_count(&self) -> usize {
        self.dels.load(Ordering::SeqCst)
    }

    /// Reads the backing map directly, bypassing counters and failures.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner.get(key).now_or_never().and_then(|result| result.ok())
    }

    async fn enter(&self, op: &'static str) -> Result<()> {
        if let Some(journal) = &self.journal {
            journal.lock().push(format!("{}.{}", self.name, op));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(&op) {
            return Err(KvError::backend(format!("{} {} failed", self.name, op)));
        }
        Ok(())
    }
}

#[async_trait]
impl<K: Key, V: Value> Kv<K, V> for MockKv<K, V> {
    async fn get(&self, key: &K) -> Result<V> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.enter("get").await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &K, value: V) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.set_calls.lock().push((key.clone(), value.clone()));
        self.enter("set").await?;
        self.inner.set(key, value).await
    }

    async fn del(&self, key: &K) -> Result<()> {
        self.dels.fetch_add(1, Ordering::SeqCst);
        self.enter("del").await?;
        self.inner.del(key).await
    }
}

#[async_trait]
impl<K: Key, V: Value> BatchKv<K, V> for MockKv<K, V> {
    async fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>> {
        self.get_many_calls.lock().push(keys.to_vec());
        self.enter("get_many").await?;
        self.inner.get_many(keys).await
    }

    async fn set_many(&self, entries: &HashMap<K, V>) -> Result<()> {
        self.set_many_calls.lock().push(entries.clone());
        self.enter("set_many").await?;
        self.inner.set_many(entries).await
    }

    async fn del_many(&self, keys: &[K]) -> Result<()> {
        self.del_many_calls.lock().push(keys.to_vec());
        self.enter("del_many").await?;
        self.inner.del_many(keys).await
    }
}
