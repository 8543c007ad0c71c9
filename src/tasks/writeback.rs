//! Write-back Task
//!
//! Populates upper layers with a value found deeper in a layer chain.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::kv::{DynKv, Key, Value};
use crate::telemetry::{notify, Outcome, TelemetryHook};

/// Upper layers to populate, each with its 1-based position in the chain.
pub type WritebackTargets<K, V> = Vec<(usize, DynKv<K, V>)>;

/// Writes `value` into every target layer, in order.
///
/// Failures are logged and reported to `telemetry`; they never stop the
/// remaining layers from being written.
pub async fn write_back<K: Key, V: Value>(
    targets: &[(usize, DynKv<K, V>)],
    key: &K,
    value: &V,
    telemetry: Option<&TelemetryHook<K>>,
) {
    for (layer, store) in targets {
        if let Err(err) = store.set(key, value.clone()).await {
            warn!(layer, error = %err, "Write-back into upper layer failed");
            if let Some(hook) = telemetry {
                notify(hook, key, Outcome::WritebackFailed, *layer);
            }
        }
    }
}

/// Spawns a detached write-back bounded by `timeout`.
///
/// The task is independent of the read that triggered it: dropping the
/// caller's future neither cancels nor extends it. On timeout, every target
/// layer not yet written is reported as `WritebackFailed`.
pub fn spawn_writeback<K: Key, V: Value>(
    targets: WritebackTargets<K, V>,
    key: K,
    value: V,
    timeout: Duration,
    telemetry: Option<TelemetryHook<K>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut written = 0;
        let completed = tokio::time::timeout(timeout, async {
            for target in &targets {
                write_back(std::slice::from_ref(target), &key, &value, telemetry.as_ref()).await;
                written += 1;
            }
        })
        .await;

        match completed {
            Ok(()) => debug!(layers = written, "Asynchronous write-back completed"),
            Err(_) => {
                warn!(?timeout, "Asynchronous write-back timed out");
                if let Some(hook) = &telemetry {
                    for (layer, _) in &targets[written..] {
                        notify(hook, &key, Outcome::WritebackFailed, *layer);
                    }
                }
            }
        }
    })
}
