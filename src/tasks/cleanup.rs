//! TTL Cleanup Task
//!
//! Background task that periodically purges expired bounded-store entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::kv::{Key, Value};
use crate::store::BoundedKv;

/// Spawns a background task that periodically removes expired entries.
///
/// Expired entries already read as not-found; the sweep only reclaims their
/// memory ahead of the next access. The task runs until the returned handle is
/// aborted.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(BoundedKv::new(config)?);
/// let cleanup_handle = spawn_cleanup_task(Arc::clone(&cache), Duration::from_secs(1));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<K: Key, V: Value>(
    store: Arc<BoundedKv<K, V>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "Starting TTL cleanup task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.purge_expired();

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
