//! The worker pool.
//!
//! - [`core`]: pool construction, submission and shutdown,
//! - [`worker`]: the per-thread loop that pops, steals and parks.

pub(crate) mod core;
pub(crate) mod worker;
