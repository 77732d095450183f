//! The scheduler: worker pool, task queues and runtime lifecycle.
//!
//! It is responsible for:
//! - executing submitted work on a fixed pool of worker threads,
//! - balancing queued work through work stealing,
//! - installing the per-thread runtime context used by `task::submit`,
//!   `sleep` and `timeout`,
//! - cooperative yielding.

mod core;
mod executor;
mod work_stealing;

pub(crate) mod builder;
pub(crate) mod context;
pub(crate) mod yield_now;

pub mod task;

pub use self::core::Runtime;
