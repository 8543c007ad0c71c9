//! Error types for the key-value stores
//!
//! Provides unified error handling using thiserror.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

// == Kv Error Enum ==
/// Unified error type for every store and composer.
///
/// The type is `Clone` so that a single result can be handed to every caller
/// sharing a deduplicated call.
#[derive(Error, Debug, Clone)]
pub enum KvError {
    /// Key is absent (never stored, deleted, expired or evicted)
    #[error("key not found")]
    NotFound,

    /// Any failure reported by an underlying store
    #[error("backend failure: {0}")]
    Backend(Arc<dyn StdError + Send + Sync>),

    /// The source read succeeded but writing the value into the cache failed
    #[error("populate cache: {0}")]
    Populate(Box<KvError>),

    /// Invalid construction parameters
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl KvError {
    /// Wraps an arbitrary error (or message) as a backend failure.
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        KvError::Backend(Arc::from(err.into()))
    }

    /// Returns true if this is the distinguished not-found kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::NotFound)
    }
}

// == Result Type Alias ==
/// Convenience Result type for the stores.
pub type Result<T> = std::result::Result<T, KvError>;
