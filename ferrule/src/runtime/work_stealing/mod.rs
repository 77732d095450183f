//! Work-stealing queues.
//!
//! - [`injector`]: the global queue for units submitted from outside a
//!   worker or woken by another thread,
//! - [`queue`]: per-worker local queues, popped LIFO by their owner and
//!   stolen FIFO by the others.

pub(crate) mod injector;
pub(crate) mod queue;
