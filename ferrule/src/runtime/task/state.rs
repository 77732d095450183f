//! Scheduling states of a [`Task`](super::Task).
//!
//! These track whether the task sits in a queue or is being polled. The
//! user-visible lifecycle of the unit it drives lives in
//! [`UnitState`](crate::deferred::UnitState).

/// Not queued; waiting for a wake-up.
pub(crate) const IDLE: usize = 0;

/// Sitting in a run queue.
pub(crate) const QUEUED: usize = 1;

/// Being polled by a worker. At most one worker observes this state.
pub(crate) const RUNNING: usize = 2;

/// The future returned `Poll::Ready` and has been dropped.
pub(crate) const COMPLETE: usize = 3;

/// Woken while running; re-queued as soon as the current poll returns.
pub(crate) const NOTIFIED: usize = 4;
