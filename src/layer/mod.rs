//! Layer Composers
//!
//! Combine stores into a read/write path: a cache in front of a source, an
//! N-deep chain, and batch variants of the cache-aside pattern.
//!
//! Every composer writes to the source (or deeper layer) before it touches a
//! faster layer, so a cache never holds a value its source rejected.

mod batch;
mod cached_batch;
mod chain;
mod two;

pub use batch::{BatchLayerKv, BatchLayerKvBuilder};
pub use cached_batch::CachedBatchKv;
pub use chain::{ChainKv, ChainKvBuilder};
pub use two::{LayerKv, LayerKvBuilder};
