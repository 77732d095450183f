//! Scheduler entry points and the task representation behind them.
//!
//! [`submit`], [`submit_cancellable`], [`spawn`] and [`submit_fn`] queue work
//! on the current runtime and hand back a [`Deferred`](crate::Deferred)
//! observing its outcome. Internally each submission becomes a [`Task`]
//! driven by the executor's workers.

pub(crate) mod state;
pub(crate) mod waker;

mod core;
mod registry;

pub(crate) use self::core::{Task, prepare};
pub(crate) use self::registry::TaskRegistry;

pub use self::core::{spawn, submit, submit_cancellable, submit_fn};
