//! Fan-out/fan-in over deferred units.
//!
//! Both combinators are push-based: they register a continuation on each
//! input and settle the aggregate from whichever thread settles the deciding
//! input. Waiting on them never occupies a worker.
//!
//! - [`when_all`] waits for every input and keeps every fault,
//! - [`when_any`] resolves with the first input to finish and leaves the
//!   others running.

mod when_all;
mod when_any;

pub use when_all::when_all;
pub use when_any::when_any;
