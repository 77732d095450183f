//! # Ferrule
//!
//! **Ferrule** is a small multi-threaded task runtime built around
//! *deferred units*: handles to the eventual outcome of a computation, which
//! is either a value, an error, or a cancellation.
//!
//! It offers:
//!
//! - a **bounded worker pool** with work stealing ([`task::submit`],
//!   [`Runtime::block_on`]),
//! - **cooperative cancellation** through monotonic [`CancellationSignal`]s,
//! - **completion sources** that bridge callback-driven events into
//!   awaitable units ([`CompletionSource`]),
//! - **fan-out/fan-in** combinators ([`when_all`], [`when_any`]) that keep
//!   every fault instead of the first,
//! - **bounded parallel loops** with early stop and break
//!   ([`parallel::for_each_bounded`]),
//! - **timers** ([`time::sleep`], [`time::timeout`]).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrule::{CancellationSignal, task, when_all};
//!
//! #[ferrule::main]
//! async fn main() {
//!     let signal = CancellationSignal::new();
//!
//!     let units: Vec<_> = (0..4)
//!         .map(|i| {
//!             let signal = signal.clone();
//!             task::submit_cancellable(
//!                 async move {
//!                     signal.check()?;
//!                     Ok(i * 10)
//!                 },
//!                 &signal,
//!             )
//!         })
//!         .collect();
//!
//!     let values = when_all(units).await.unwrap();
//!     assert_eq!(values, vec![0, 10, 20, 30]);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`task`]: submitting work to the pool
//! - [`deferred`]: deferred units and completion sources
//! - [`cancel`]: cancellation signals
//! - [`combinator`]: `when_all` and `when_any`
//! - [`parallel`]: bounded parallel loops
//! - [`time`]: sleep and timeout

mod error;
mod runtime;
mod utils;

pub mod cancel;
pub mod combinator;
pub mod deferred;
pub mod parallel;
pub mod time;

pub use cancel::CancellationSignal;
pub use combinator::{when_all, when_any};
pub use deferred::{CompletionSource, Deferred, UnitId, UnitState};
pub use error::{Error, Result};
pub use runtime::builder::{RuntimeBuilder, WORKER_THREADS_ENV};
pub use runtime::task;
pub use runtime::yield_now::yield_now;
pub use runtime::Runtime;

pub use ferrule_macros::*;
