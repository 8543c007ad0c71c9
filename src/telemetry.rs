//! Telemetry Module
//!
//! Outcome hooks for layered reads and a timing wrapper for any store.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::kv::{Key, Kv, Value};

// == Outcome ==
/// What happened at one layer while serving a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The layer returned the value
    Hit,
    /// The layer reported not-found
    Miss,
    /// The layer failed with anything other than not-found
    Error,
    /// Writing a value back into this layer failed or timed out
    WritebackFailed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Hit => "hit",
            Outcome::Miss => "miss",
            Outcome::Error => "error",
            Outcome::WritebackFailed => "writeback_failed",
        };
        f.write_str(label)
    }
}

/// Observability callback: `(key, outcome, layer)` with a 1-based layer index.
///
/// Called inline on the request path, so it should be cheap. A panic inside
/// the hook is caught and logged and does not fail the operation.
pub type TelemetryHook<K> = Arc<dyn Fn(&K, Outcome, usize) + Send + Sync>;

/// Invokes `hook`, containing any panic it raises.
pub(crate) fn notify<K>(hook: &TelemetryHook<K>, key: &K, outcome: Outcome, layer: usize) {
    let call = panic::catch_unwind(AssertUnwindSafe(|| hook(key, outcome, layer)));
    if call.is_err() {
        warn!(%outcome, layer, "Telemetry hook panicked");
    }
}

// == Operation ==
/// Point operation kind reported by [`InstrumentedKv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Get,
    Set,
    Del,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Op::Get => "get",
            Op::Set => "set",
            Op::Del => "del",
        };
        f.write_str(label)
    }
}

/// Per-operation recorder: `(op, success, elapsed)`.
pub type RecordFn = Arc<dyn Fn(Op, bool, Duration) + Send + Sync>;

// == Instrumented Store ==
/// Wraps a store, timing every operation.
///
/// Each call is logged at debug level with the layer name and, when a
/// recorder is attached, forwarded to it. A get that ends in not-found
/// counts as unsuccessful.
pub struct InstrumentedKv<K, V> {
    layer: String,
    inner: Arc<dyn Kv<K, V>>,
    record: Option<RecordFn>,
}

impl<K: Key, V: Value> InstrumentedKv<K, V> {
    /// Wraps `inner`, labelling its log lines with `layer`.
    pub fn new(layer: impl Into<String>, inner: impl Kv<K, V> + 'static) -> Self {
        Self {
            layer: layer.into(),
            inner: Arc::new(inner),
            record: None,
        }
    }

    /// Attaches a recorder called after every operation.
    pub fn with_recorder<F>(mut self, record: F) -> Self
    where
        F: Fn(Op, bool, Duration) + Send + Sync + 'static,
    {
        self.record = Some(Arc::new(record));
        self
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    fn observe(&self, op: Op, success: bool, started: Instant) {
        let elapsed = started.elapsed();
        debug!(layer = %self.layer, %op, success, ?elapsed, "kv operation");
        if let Some(record) = &self.record {
            record(op, success, elapsed);
        }
    }
}

impl<K, V> fmt::Debug for InstrumentedKv<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedKv")
            .field("layer", &self.layer)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<K: Key, V: Value> Kv<K, V> for InstrumentedKv<K, V> {
    async fn get(&self, key: &K) -> Result<V> {
        let started = Instant::now();
        let result = self.inner.get(key).await;
        self.observe(Op::Get, result.is_ok(), started);
        result
    }

    async fn set(&self, key: &K, value: V) -> Result<()> {
        let started = Instant::now();
        let result = self.inner.set(key, value).await;
        self.observe(Op::Set, result.is_ok(), started);
        result
    }

    async fn del(&self, key: &K) -> Result<()> {
        let started = Instant::now();
        let result = self.inner.del(key).await;
        self.observe(Op::Del, result.is_ok(), started);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KvError;
    use crate::store::MapKv;
    use parking_lot::Mutex;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Hit.to_string(), "hit");
        assert_eq!(Outcome::WritebackFailed.to_string(), "writeback_failed");
        assert_eq!(serde_json::to_value(Outcome::Miss).unwrap(), "miss");
        assert_eq!(Op::Del.to_string(), "del");
    }

    #[test]
    fn test_notify_contains_hook_panic() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let hook: TelemetryHook<u8> = Arc::new(move |_key: &u8, _outcome: Outcome, _layer: usize| {
            *counter.lock() += 1;
            panic!("hook failure");
        });

        notify(&hook, &1, Outcome::Miss, 1);
        notify(&hook, &1, Outcome::Hit, 2);

        assert_eq!(*calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_instrumented_records_each_operation() {
        let seen: Arc<Mutex<Vec<(Op, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let store = InstrumentedKv::new("db", MapKv::new())
            .with_recorder(move |op, success, _| sink.lock().push((op, success)));

        store.set(&"a", 1).await.unwrap();
        assert_eq!(store.get(&"a").await.unwrap(), 1);
        assert!(matches!(store.get(&"b").await, Err(KvError::NotFound)));
        store.del(&"a").await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                (Op::Set, true),
                (Op::Get, true),
                (Op::Get, false),
                (Op::Del, true),
            ]
        );
        assert_eq!(store.layer(), "db");
    }
}
