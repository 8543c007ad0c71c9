//! Store Module
//!
//! Leaf stores: a single-lock map, a sharded map and a capacity/TTL-bounded
//! store. All of them implement both `Kv` and `BatchKv`.

mod bounded;
mod entry;
mod eviction;
mod map;
mod sharded;
mod stats;
mod ttl;


// Re-export public types
pub use bounded::{BoundedConfig, BoundedKv, EvictFn};
pub use entry::CacheEntry;
pub use eviction::{EvictionPolicy, EvictionTracker};
pub use map::MapKv;
pub use sharded::{normalize_shard_count, ShardedKv, DEFAULT_SHARD_COUNT};
pub use stats::CacheStats;
pub use ttl::{jitter, TtlFn, TtlPolicy};
