//! kvstack - Composable key-value caching layers
//!
//! Interchangeable in-memory stores (plain map, sharded map, capacity and TTL
//! bounded cache) stacked through layering, single-flight deduplication and
//! batch fill to build a multi-tier read/write path in front of a slower
//! source of truth.

pub mod config;
pub mod error;
pub mod flight;
pub mod kv;
pub mod layer;
pub mod store;
pub mod tasks;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod mock;

pub use config::Config;
pub use error::{KvError, Result};
pub use flight::{Group, SingleFlightKv};
pub use kv::{BatchKv, DynBatchKv, DynKv, Key, Kv, Value};
pub use layer::{BatchLayerKv, CachedBatchKv, ChainKv, LayerKv};
pub use store::{BoundedConfig, BoundedKv, EvictionPolicy, MapKv, ShardedKv, TtlPolicy};
pub use tasks::spawn_cleanup_task;
pub use telemetry::{InstrumentedKv, Outcome, TelemetryHook};
