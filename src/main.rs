//! kvstack demo
//!
//! Builds a cache stack in front of a simulated slow database and walks
//! through a read stampede, write invalidation, a three-tier chain and a
//! batch fill.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kvstack::layer::{BatchLayerKv, ChainKv, LayerKv};
use kvstack::store::{BoundedConfig, BoundedKv, ShardedKv};
use kvstack::telemetry::Op;
use kvstack::{spawn_cleanup_task, BatchKv, Config, InstrumentedKv, Kv, SingleFlightKv};

const STAMPEDE_CALLERS: usize = 100;
const DB_LATENCY: Duration = Duration::from_millis(50);

/// Stand-in for a remote database: correct but slow.
struct SimulatedDb {
    rows: ShardedKv<String, String>,
    latency: Duration,
}

impl SimulatedDb {
    async fn seeded(shard_count: usize, rows: usize) -> kvstack::Result<Self> {
        let db = Self {
            rows: ShardedKv::new(shard_count),
            latency: DB_LATENCY,
        };
        let seed: HashMap<String, String> = (0..rows)
            .map(|i| (format!("user:{i}"), format!("profile-{i}")))
            .collect();
        db.rows.set_many(&seed).await?;
        Ok(db)
    }
}

#[async_trait]
impl Kv<String, String> for SimulatedDb {
    async fn get(&self, key: &String) -> kvstack::Result<String> {
        tokio::time::sleep(self.latency).await;
        self.rows.get(key).await
    }

    async fn set(&self, key: &String, value: String) -> kvstack::Result<()> {
        tokio::time::sleep(self.latency).await;
        self.rows.set(key, value).await
    }

    async fn del(&self, key: &String) -> kvstack::Result<()> {
        tokio::time::sleep(self.latency).await;
        self.rows.del(key).await
    }
}

#[async_trait]
impl BatchKv<String, String> for SimulatedDb {
    async fn get_many(&self, keys: &[String]) -> kvstack::Result<HashMap<String, String>> {
        tokio::time::sleep(self.latency).await;
        self.rows.get_many(keys).await
    }

    async fn set_many(&self, entries: &HashMap<String, String>) -> kvstack::Result<()> {
        tokio::time::sleep(self.latency).await;
        self.rows.set_many(entries).await
    }

    async fn del_many(&self, keys: &[String]) -> kvstack::Result<()> {
        tokio::time::sleep(self.latency).await;
        self.rows.del_many(keys).await
    }
}

fn bounded_cache(config: &Config) -> anyhow::Result<Arc<BoundedKv<String, String>>> {
    let cache = BoundedKv::new(
        BoundedConfig::new(config.cache_capacity).ttl(config.ttl_policy()),
    )?;
    Ok(Arc::new(cache))
}

/// Main entry point for the kvstack demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Stampede a cache-aside stack and count database reads
/// 4. Show write invalidation (or write-through)
/// 5. Read through a three-tier chain with write-back
/// 6. Fill a batch cache from a partial hit
/// 7. Print cache statistics as JSON
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvstack=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting kvstack demo");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: shards={}, capacity={}, ttl={}ms, write_through={}, writeback_timeout={}ms",
        config.shard_count,
        config.cache_capacity,
        config.cache_ttl_ms,
        config.write_through,
        config.writeback_timeout_ms
    );

    let db = Arc::new(SimulatedDb::seeded(config.shard_count, 100).await?);
    let db_reads = Arc::new(AtomicUsize::new(0));

    // == Cache-aside with single-flight ==
    let counter = Arc::clone(&db_reads);
    let source = SingleFlightKv::new(InstrumentedKv::new("db", Arc::clone(&db)).with_recorder(
        move |op, _, _| {
            if op == Op::Get {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        },
    ));
    let cache = bounded_cache(&config)?;
    let cleanup_handle = spawn_cleanup_task(Arc::clone(&cache), config.cleanup_interval());

    let store = Arc::new(
        LayerKv::builder()
            .cache(Arc::clone(&cache))
            .source(source)
            .write_through(config.write_through)
            .build()?,
    );

    let key = "user:1".to_string();
    let handles: Vec<_> = (0..STAMPEDE_CALLERS)
        .map(|_| {
            let store = Arc::clone(&store);
            let key = key.clone();
            tokio::spawn(async move { store.get(&key).await })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }
    info!(
        callers = STAMPEDE_CALLERS,
        db_reads = db_reads.load(Ordering::Relaxed),
        "Stampede served"
    );

    store.set(&key, "profile-1-updated".to_string()).await?;
    let before = db_reads.load(Ordering::Relaxed);
    let value = store.get(&key).await?;
    info!(
        %value,
        refetched = db_reads.load(Ordering::Relaxed) > before,
        "Read after write"
    );

    // == Three-tier chain ==
    let chain = ChainKv::builder()
        .layer(bounded_cache(&config)?)
        .layer(ShardedKv::<String, String>::new(config.shard_count))
        .layer(Arc::clone(&db))
        .writeback_timeout(config.writeback_timeout())
        .telemetry(|key: &String, outcome, layer| {
            info!(%key, %outcome, layer, "Chain telemetry");
        })
        .build()?;
    let first = chain.get(&"user:7".to_string()).await?;
    let second = chain.get(&"user:7".to_string()).await?;
    info!(%first, %second, "Chain reads");

    // == Batch fill ==
    let batch_cache = Arc::new(ShardedKv::<String, String>::new(config.shard_count));
    let warm: HashMap<String, String> = [("user:10".to_string(), "profile-10".to_string())]
        .into_iter()
        .collect();
    batch_cache.set_many(&warm).await?;

    let batch = BatchLayerKv::builder()
        .cache(Arc::clone(&batch_cache))
        .source(Arc::clone(&db))
        .build()?;
    let keys: Vec<String> = (10..15).map(|i| format!("user:{i}")).collect();
    let rows = batch.get_many(&keys).await?;
    info!(
        requested = keys.len(),
        returned = rows.len(),
        cached = batch_cache.len(),
        "Batch fill"
    );

    println!("{}", serde_json::to_string_pretty(&cache.stats())?);

    cleanup_handle.abort();
    info!("Demo complete");
    Ok(())
}
