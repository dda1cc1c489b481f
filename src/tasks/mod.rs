//! Background Tasks Module
//!
//! Optional tasks that run alongside the cache.
//!
//! # Tasks
//! - TTL Sweep: Removes expired entries that nothing has read since they expired

mod sweep;

pub use sweep::spawn_sweep_task;
