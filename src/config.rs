//! Configuration Module
//!
//! Loads store and composer tuning from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{KvError, Result};
use crate::store::TtlPolicy;

/// Tuning knobs for a composed store stack.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Shards in a sharded store (0 selects the default of 32)
    pub shard_count: usize,
    /// Maximum number of entries a bounded cache can hold
    pub cache_capacity: usize,
    /// Entry lifetime in milliseconds (0 = entries never expire)
    pub cache_ttl_ms: u64,
    /// Randomize each entry's lifetime within [0.5, 1.5) of the TTL
    pub cache_ttl_jitter: bool,
    /// Write new values into the cache instead of invalidating them
    pub write_through: bool,
    /// Detached write-back budget in milliseconds (0 = write back synchronously)
    pub writeback_timeout_ms: u64,
    /// Expired-entry sweep interval in milliseconds
    pub cleanup_interval_ms: u64,
}

fn var_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SHARD_COUNT` - Shards per sharded store (default: 32)
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 1000)
    /// - `CACHE_TTL_MS` - Entry TTL in milliseconds, 0 disables (default: 300000)
    /// - `CACHE_TTL_JITTER` - Jitter entry TTLs (default: false)
    /// - `WRITE_THROUGH` - Write-through instead of invalidate (default: false)
    /// - `WRITEBACK_TIMEOUT_MS` - Async write-back budget, 0 is synchronous (default: 0)
    /// - `CLEANUP_INTERVAL_MS` - Expired-entry sweep frequency (default: 1000)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            shard_count: var_or("SHARD_COUNT", defaults.shard_count),
            cache_capacity: var_or("CACHE_CAPACITY", defaults.cache_capacity),
            cache_ttl_ms: var_or("CACHE_TTL_MS", defaults.cache_ttl_ms),
            cache_ttl_jitter: var_or("CACHE_TTL_JITTER", defaults.cache_ttl_jitter),
            write_through: var_or("WRITE_THROUGH", defaults.write_through),
            writeback_timeout_ms: var_or("WRITEBACK_TIMEOUT_MS", defaults.writeback_timeout_ms),
            cleanup_interval_ms: var_or("CLEANUP_INTERVAL_MS", defaults.cleanup_interval_ms),
        }
    }

    /// Rejects values no store could be built from.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(KvError::Config("cache capacity must be positive".to_string()));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(KvError::Config(
                "cleanup interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Expiry policy for a bounded cache built from this config.
    pub fn ttl_policy<K>(&self) -> TtlPolicy<K> {
        match (self.cache_ttl_ms, self.cache_ttl_jitter) {
            (0, _) => TtlPolicy::Never,
            (ms, false) => TtlPolicy::Fixed(Duration::from_millis(ms)),
            (ms, true) => TtlPolicy::Jittered(Duration::from_millis(ms)),
        }
    }

    /// Budget for detached write-back, zero meaning synchronous.
    pub fn writeback_timeout(&self) -> Duration {
        Duration::from_millis(self.writeback_timeout_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_count: 32,
            cache_capacity: 1000,
            cache_ttl_ms: 300_000,
            cache_ttl_jitter: false,
            write_through: false,
            writeback_timeout_ms: 0,
            cleanup_interval_ms: 1000,
        }
    }
}
