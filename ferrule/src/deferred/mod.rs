//! Deferred units and completion sources.
//!
//! A [`Deferred`] is the eventual outcome of a computation: a value, an
//! error, or a cancellation. It is produced by the scheduler
//! ([`task::submit`](crate::task::submit)), by a [`CompletionSource`], by
//! the combinators, or by the ready constructors below.
//!
//! Once a unit reaches a terminal state its outcome never changes and can be
//! read any number of times. Continuations registered with
//! [`Deferred::on_complete`] fire exactly once, in registration order, on the
//! thread that settles the unit (or on the registering thread when the unit is
//! already terminal).

mod cell;
mod source;

pub(crate) use cell::Cell;
pub use cell::{UnitId, UnitState};
pub use source::CompletionSource;

use crate::error::{Error, Result, panic_message};

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, mpsc};
use std::task::{Context, Poll};

/// Handle to the eventual outcome of a computation.
///
/// `Deferred` is cheap to clone; every clone observes the same unit.
/// Awaiting it yields a clone of the outcome, so awaiting twice returns the
/// same value both times.
///
/// Dropping every handle does **not** cancel the underlying work; it only
/// discards the ability to observe it.
pub struct Deferred<T> {
    pub(crate) cell: Arc<Cell<T>>,
}

impl<T> Deferred<T> {
    pub(crate) fn from_cell(cell: Arc<Cell<T>>) -> Self {
        Self { cell }
    }

    /// Identifier of this unit.
    pub fn id(&self) -> UnitId {
        self.cell.id()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> UnitState {
        self.cell.state()
    }

    /// Returns `true` once the unit is completed, faulted or cancelled.
    pub fn is_terminal(&self) -> bool {
        self.cell.outcome().is_some()
    }

    /// Borrows the terminal outcome, if any.
    pub fn outcome(&self) -> Option<&Result<T>> {
        self.cell.outcome()
    }
}

impl<T: Send + Sync + 'static> Deferred<T> {
    /// A unit already completed with `value`.
    pub fn completed(value: T) -> Self {
        Self::settled(Ok(value))
    }

    /// A unit already faulted with `error`.
    pub fn faulted(error: Error) -> Self {
        Self::settled(Err(error))
    }

    /// A unit already cancelled.
    pub fn cancelled() -> Self {
        Self::settled(Err(Error::OperationCancelled))
    }

    fn settled(outcome: Result<T>) -> Self {
        let cell = Cell::new();
        let _ = cell.settle(outcome);
        Self::from_cell(Arc::new(cell))
    }

    /// Registers a continuation that runs once the unit is terminal.
    ///
    /// If the unit is already terminal the continuation runs immediately on
    /// the calling thread. A panicking continuation is logged and does not
    /// prevent later continuations from running.
    pub fn on_complete<F>(&self, continuation: F)
    where
        F: FnOnce(&Result<T>) + Send + 'static,
    {
        self.cell.on_complete(Box::new(continuation));
    }

    /// Chains a synchronous continuation, returning the unit it produces.
    ///
    /// `f` runs on the thread that settles `self`. A panic inside `f`
    /// faults the returned unit with [`Error::Panicked`].
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let doubled = unit.then(|outcome| outcome.as_ref().map(|v| v * 2).map_err(Clone::clone));
    /// ```
    pub fn then<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&Result<T>) -> Result<U> + Send + 'static,
    {
        let source = CompletionSource::new();
        let next = source.deferred();

        self.on_complete(move |outcome| {
            let produced = panic::catch_unwind(AssertUnwindSafe(|| f(outcome)))
                .unwrap_or_else(|payload| Err(Error::Panicked(panic_message(payload.as_ref()))));
            let _ = source.settle(produced);
        });

        next
    }

    /// Blocks the current thread until the unit is terminal.
    ///
    /// Intended for threads that live outside the runtime. Calling this from
    /// a worker thread stalls that worker for the duration of the wait.
    pub fn wait_blocking(&self) -> Result<T>
    where
        T: Clone,
    {
        let (transmitter, receiver) = mpsc::channel();
        self.on_complete(move |_| {
            let _ = transmitter.send(());
        });
        let _ = receiver.recv();

        match self.cell.outcome() {
            Some(outcome) => outcome.clone(),
            None => Err(Error::OperationCancelled),
        }
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Clone> Future for Deferred<T> {
    /// A clone of the terminal outcome.
    type Output = Result<T>;

    /// Resolves once the unit is terminal, registering the current waker
    /// otherwise. Awaiting never occupies a worker.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.cell.poll_outcome(cx).map(Clone::clone)
    }
}
