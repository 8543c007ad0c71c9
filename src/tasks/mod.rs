//! Background Tasks Module
//!
//! The only work that runs outside a caller's request.
//!
//! # Tasks
//! - Write-back: populates upper layers after a deeper hit, detached and time-bounded
//! - TTL Cleanup: purges expired bounded-store entries at a fixed interval

mod cleanup;
mod writeback;

pub use cleanup::spawn_cleanup_task;
pub use writeback::{spawn_writeback, write_back, WritebackTargets};
