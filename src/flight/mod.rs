//! Single-Flight Module
//!
//! Deduplication of concurrent identical work, either for arbitrary futures
//! (`Group`) or for every operation of a wrapped store (`SingleFlightKv`).

mod group;
mod kv;

pub use group::Group;
pub use kv::SingleFlightKv;
