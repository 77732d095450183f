//! Cooperative cancellation.
//!
//! A [`CancellationSignal`] is shared between the party that requests
//! cancellation and the work that honors it. Nothing in the runtime ever
//! interrupts running work: a signal only becomes visible at the points where
//! the work checks it.

mod signal;

pub use signal::{CancellationSignal, Cancelled, Registration};
