use crate::error::{Error, Result, panic_message};

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::task::{Context, Poll, Waker};

/// Process-unique identifier of a deferred unit.
///
/// Used to correlate log lines and to tell units apart after a
/// [`when_any`](crate::combinator::when_any) race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u64);

impl UnitId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        UnitId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observable lifecycle state of a deferred unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Created but not yet picked up by a worker.
    Pending,
    /// A worker has started polling the work.
    Running,
    /// Finished with a value.
    Completed,
    /// Finished with an error other than cancellation.
    Faulted,
    /// Finished with [`Error::OperationCancelled`].
    Cancelled,
}

impl UnitState {
    /// Returns `true` for `Completed`, `Faulted` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UnitState::Completed | UnitState::Faulted | UnitState::Cancelled
        )
    }
}

pub(crate) type Continuation<T> = Box<dyn FnOnce(&Result<T>) + Send>;

/// Shared single-assignment outcome cell behind every `Deferred`.
///
/// The outcome lives in a [`OnceLock`], so once it is written every reader
/// can borrow it without locking. The mutex only guards bookkeeping:
/// continuations, waiters and the drain flag.
pub(crate) struct Cell<T> {
    id: UnitId,

    /// Terminal outcome. Written exactly once.
    outcome: OnceLock<Result<T>>,

    /// Set by the scheduler on the first poll of the work.
    running: AtomicBool,

    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    /// Continuations in registration order.
    continuations: VecDeque<Continuation<T>>,

    /// Wakers of tasks awaiting the unit.
    waiters: Vec<Waker>,

    /// Whether some thread is currently running continuations.
    firing: bool,
}

impl<T> Cell<T> {
    pub(crate) fn new() -> Self {
        Self {
            id: UnitId::next(),
            outcome: OnceLock::new(),
            running: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                continuations: VecDeque::new(),
                waiters: Vec::new(),
                firing: false,
            }),
        }
    }

    pub(crate) fn id(&self) -> UnitId {
        self.id
    }

    pub(crate) fn outcome(&self) -> Option<&Result<T>> {
        self.outcome.get()
    }

    pub(crate) fn mark_running(&self) {
        self.running.store(true, Ordering::Release);
    }

    pub(crate) fn state(&self) -> UnitState {
        match self.outcome.get() {
            Some(Ok(_)) => UnitState::Completed,
            Some(Err(Error::OperationCancelled)) => UnitState::Cancelled,
            Some(Err(_)) => UnitState::Faulted,
            None if self.running.load(Ordering::Acquire) => UnitState::Running,
            None => UnitState::Pending,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes the terminal outcome, wakes every waiter and fires the
    /// continuations on the calling thread.
    ///
    /// Only the first call has any effect; later calls return
    /// [`Error::AlreadySettled`].
    pub(crate) fn settle(&self, outcome: Result<T>) -> Result<()> {
        if self.outcome.set(outcome).is_err() {
            return Err(Error::AlreadySettled);
        }

        tracing::trace!(unit = %self.id, state = ?self.state(), "unit settled");

        let waiters = mem::take(&mut self.lock().waiters);
        for waiter in waiters {
            waiter.wake();
        }

        self.drain();
        Ok(())
    }

    /// Registers a continuation, firing it right away when the unit is
    /// already terminal.
    pub(crate) fn on_complete(&self, continuation: Continuation<T>) {
        self.lock().continuations.push_back(continuation);
        self.drain();
    }

    /// Polls for the terminal outcome, registering the waker otherwise.
    ///
    /// The waker is registered **before** re-checking the outcome to avoid
    /// missed wake-ups.
    pub(crate) fn poll_outcome(&self, cx: &mut Context<'_>) -> Poll<&Result<T>> {
        if let Some(outcome) = self.outcome.get() {
            return Poll::Ready(outcome);
        }

        {
            let mut inner = self.lock();
            if !inner.waiters.iter().any(|w| w.will_wake(cx.waker())) {
                inner.waiters.push(cx.waker().clone());
            }
        }

        match self.outcome.get() {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }

    /// Runs queued continuations in order once the outcome is known.
    ///
    /// Only one thread drains at a time; a continuation registered while
    /// another thread is draining is picked up by that thread, which keeps
    /// registration order intact.
    fn drain(&self) {
        let Some(outcome) = self.outcome.get() else {
            return;
        };

        let mut inner = self.lock();
        if inner.firing {
            return;
        }
        inner.firing = true;

        loop {
            let Some(continuation) = inner.continuations.pop_front() else {
                inner.firing = false;
                return;
            };
            drop(inner);

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| continuation(outcome))) {
                tracing::warn!(
                    unit = %self.id,
                    panic = %panic_message(payload.as_ref()),
                    "continuation panicked"
                );
            }

            inner = self.lock();
        }
    }
}
