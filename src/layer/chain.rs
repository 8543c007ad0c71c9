//! N-Layer Chain
//!
//! An ordered list of stores, nearest first, read top-down with write-back
//! of deeper hits into every layer above.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{KvError, Result};
use crate::kv::{DynKv, Key, Kv, Value};
use crate::tasks::{spawn_writeback, write_back, WritebackTargets};
use crate::telemetry::{notify, Outcome, TelemetryHook};

// == Chain Store ==
/// Multi-tier store.
///
/// `get` returns the value from the first layer that has it and copies it
/// into every layer above. With a zero write-back timeout the copy finishes
/// before `get` returns; otherwise it runs on a detached task bounded by the
/// timeout. Write-back never fails the read.
///
/// `set` and `del` visit every layer in order and stop at the first error,
/// leaving earlier layers already modified.
pub struct ChainKv<K, V> {
    layers: Vec<DynKv<K, V>>,
    writeback_timeout: Duration,
    telemetry: Option<TelemetryHook<K>>,
}

impl<K: Key, V: Value> ChainKv<K, V> {
    /// Starts an empty builder; add layers nearest first.
    pub fn builder() -> ChainKvBuilder<K, V> {
        ChainKvBuilder::default()
    }

    /// Number of layers in the chain.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    fn report(&self, key: &K, outcome: Outcome, layer: usize) {
        if let Some(hook) = &self.telemetry {
            notify(hook, key, outcome, layer);
        }
    }

    async fn populate_above(&self, found_at: usize, key: &K, value: &V) {
        if found_at == 0 {
            return;
        }

        let targets: WritebackTargets<K, V> = self.layers[..found_at]
            .iter()
            .enumerate()
            .map(|(index, layer)| (index + 1, Arc::clone(layer)))
            .collect();

        if self.writeback_timeout.is_zero() {
            write_back(&targets, key, value, self.telemetry.as_ref()).await;
        } else {
            spawn_writeback(
                targets,
                key.clone(),
                value.clone(),
                self.writeback_timeout,
                self.telemetry.clone(),
            );
        }
    }
}

impl<K, V> fmt::Debug for ChainKv<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainKv")
            .field("depth", &self.layers.len())
            .field("writeback_timeout", &self.writeback_timeout)
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}

// == Builder ==
/// Builder for [`ChainKv`].
pub struct ChainKvBuilder<K, V> {
    layers: Vec<DynKv<K, V>>,
    writeback_timeout: Duration,
    telemetry: Option<TelemetryHook<K>>,
}

impl<K, V> Default for ChainKvBuilder<K, V> {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            writeback_timeout: Duration::ZERO,
            telemetry: None,
        }
    }
}

impl<K: Key, V: Value> ChainKvBuilder<K, V> {
    /// Appends a layer below the ones already added.
    pub fn layer(mut self, layer: impl Kv<K, V> + 'static) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    /// Zero (the default) writes back synchronously.
    pub fn writeback_timeout(mut self, timeout: Duration) -> Self {
        self.writeback_timeout = timeout;
        self
    }

    /// Reports each layer's outcome on every `get`, plus write-back failures.
    pub fn telemetry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&K, Outcome, usize) + Send + Sync + 'static,
    {
        self.telemetry = Some(Arc::new(hook));
        self
    }

    /// Fails with `KvError::Config` if no layer was added.
    pub fn build(self) -> Result<ChainKv<K, V>> {
        if self.layers.is_empty() {
            return Err(KvError::Config(
                "layer chain requires at least one layer".to_string(),
            ));
        }

        Ok(ChainKv {
            layers: self.layers,
            writeback_timeout: self.writeback_timeout,
            telemetry: self.telemetry,
        })
    }
}

#[async_trait]
impl<K: Key, V: Value> Kv<K, V> for ChainKv<K, V> {
    async fn get(&self, key: &K) -> Result<V> {
        for (index, layer) in self.layers.iter().enumerate() {
            match layer.get(key).await {
                Ok(value) => {
                    self.report(key, Outcome::Hit, index + 1);
                    debug!(layer = index + 1, "Chain hit");
                    self.populate_above(index, key, &value).await;
                    return Ok(value);
                }
                Err(KvError::NotFound) => self.report(key, Outcome::Miss, index + 1),
                Err(err) => {
                    self.report(key, Outcome::Error, index + 1);
                    return Err(err);
                }
            }
        }
        Err(KvError::NotFound)
    }

    async fn set(&self, key: &K, value: V) -> Result<()> {
        for layer in &self.layers {
            layer.set(key, value.clone()).await?;
        }
        Ok(())
    }

    async fn del(&self, key: &K) -> Result<()> {
        for layer in &self.layers {
            layer.del(key).await?;
        }
        Ok(())
    }
}
