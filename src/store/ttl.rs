//! TTL Policy Module
//!
//! Decides how long a bounded-store entry lives.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

/// Per-key TTL function.
pub type TtlFn<K> = Arc<dyn Fn(&K) -> Duration + Send + Sync>;

// == TTL Policy ==
/// Expiry rule applied on every write.
pub enum TtlPolicy<K> {
    /// Entries never expire
    Never,
    /// Every entry lives exactly this long
    Fixed(Duration),
    /// Each entry lives a uniformly random duration in `[0.5 d, 1.5 d)`, so
    /// entries written together do not all expire together
    Jittered(Duration),
    /// Duration computed from the key
    PerKey(TtlFn<K>),
}

impl<K> TtlPolicy<K> {
    /// Builds a `PerKey` policy from a closure.
    pub fn per_key<F>(f: F) -> Self
    where
        F: Fn(&K) -> Duration + Send + Sync + 'static,
    {
        TtlPolicy::PerKey(Arc::new(f))
    }

    /// TTL for a write of `key`, None when it should never expire.
    pub fn ttl_for(&self, key: &K) -> Option<Duration> {
        match self {
            TtlPolicy::Never => None,
            TtlPolicy::Fixed(ttl) => Some(*ttl),
            TtlPolicy::Jittered(ttl) => Some(jitter(*ttl)),
            TtlPolicy::PerKey(f) => Some(f(key)),
        }
    }
}

/// Scales `ttl` by a random factor in `[0.5, 1.5)`, saturating at `Duration::MAX`.
pub fn jitter(ttl: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.5..1.5);
    Duration::try_from_secs_f64(ttl.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

impl<K> Default for TtlPolicy<K> {
    fn default() -> Self {
        TtlPolicy::Never
    }
}

impl<K> Clone for TtlPolicy<K> {
    fn clone(&self) -> Self {
        match self {
            TtlPolicy::Never => TtlPolicy::Never,
            TtlPolicy::Fixed(ttl) => TtlPolicy::Fixed(*ttl),
            TtlPolicy::Jittered(ttl) => TtlPolicy::Jittered(*ttl),
            TtlPolicy::PerKey(f) => TtlPolicy::PerKey(Arc::clone(f)),
        }
    }
}

impl<K> fmt::Debug for TtlPolicy<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TtlPolicy::Never => write!(f, "Never"),
            TtlPolicy::Fixed(ttl) => write!(f, "Fixed({ttl:?})"),
            TtlPolicy::Jittered(ttl) => write!(f, "Jittered({ttl:?})"),
            TtlPolicy::PerKey(_) => write!(f, "PerKey(..)"),
        }
    }
}
