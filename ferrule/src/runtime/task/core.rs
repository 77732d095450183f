use super::state::{COMPLETE, IDLE, NOTIFIED, QUEUED, RUNNING};
use super::waker::make_waker;
use crate::cancel::CancellationSignal;
use crate::deferred::{Cell, Deferred, UnitId};
use crate::error::{Error, Result, panic_message};
use crate::runtime::context::{CURRENT_LOCALS, CURRENT_WORKER_ID, current_injector};
use crate::runtime::work_stealing::injector::Injector;

use std::cell::UnsafeCell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A scheduled future owned by the executor.
///
/// The future is always a [`Guarded`] wrapper, so by the time it returns
/// `Poll::Ready` the deferred unit it drives has been settled. The task itself
/// only tracks queueing state.
pub(crate) struct Task {
    /// Unit driven by this task, for logging.
    unit: UnitId,

    /// The wrapped future, dropped as soon as it completes.
    ///
    /// Only the worker that moved the state to `RUNNING` touches it.
    future: UnsafeCell<Option<BoxFuture>>,

    state: AtomicUsize,

    /// Used to re-queue the task when it is woken.
    injector: Arc<Injector>,

    /// Key in the runtime's task registry, `UNREGISTERED` if refused.
    key: AtomicUsize,
}

const UNREGISTERED: usize = usize::MAX;

unsafe impl Send for Task {}
unsafe impl Sync for Task {}

impl Task {
    /// Creates a task and records it in the runtime's registry.
    ///
    /// After shutdown the registry refuses the task; pushing it is then a
    /// no-op and dropping it cancels its unit.
    pub(crate) fn new<F>(unit: UnitId, future: F, injector: Arc<Injector>) -> Arc<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = Arc::new(Self {
            unit,
            future: UnsafeCell::new(Some(Box::pin(future))),
            state: AtomicUsize::new(QUEUED),
            injector,
            key: AtomicUsize::new(UNREGISTERED),
        });

        if let Some(key) = task.injector.registry().insert(task.clone()) {
            task.key.store(key, Ordering::Release);
        }

        task
    }

    /// Polls the task once.
    ///
    /// - `Poll::Pending`: back to `IDLE`, or re-queued if woken meanwhile.
    /// - `Poll::Ready`: the future is dropped and the task is `COMPLETE`.
    pub(crate) fn run(self: Arc<Self>) {
        let current = self.state.load(Ordering::Acquire);

        if current != QUEUED && current != NOTIFIED {
            return;
        }

        if self
            .state
            .compare_exchange(current, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let waker = make_waker(self.clone());
        let mut cx = Context::from_waker(&waker);

        // Safety: the RUNNING state guarantees that no other thread touches the future.
        let slot = unsafe { &mut *self.future.get() };
        let Some(future) = slot.as_mut() else {
            self.state.store(COMPLETE, Ordering::Release);
            return;
        };

        match future.as_mut().poll(&mut cx) {
            Poll::Pending => {
                if self
                    .state
                    .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    // Woken while running.
                    self.state.store(QUEUED, Ordering::Release);
                    self.injector.push(self.clone());
                }
            }
            Poll::Ready(()) => {
                *slot = None;
                self.state.store(COMPLETE, Ordering::Release);
                self.retire();
                tracing::trace!(unit = %self.unit, "task retired");
            }
        }
    }

    fn retire(&self) {
        let key = self.key.swap(UNREGISTERED, Ordering::AcqRel);
        if key != UNREGISTERED {
            self.injector.registry().remove(key);
        }
    }

    /// Drops the future of a task that will never be polled again, which
    /// cancels its unit.
    ///
    /// Only called at shutdown, once every worker has been joined.
    pub(crate) fn abort(&self) {
        if self.state.swap(COMPLETE, Ordering::AcqRel) == COMPLETE {
            return;
        }

        // Safety: no worker is left to poll the future, and wakers only
        // touch `state`.
        let future = unsafe { (*self.future.get()).take() };
        self.key.store(UNREGISTERED, Ordering::Release);

        if future.is_some() {
            tracing::trace!(unit = %self.unit, "task aborted");
        }
        drop(future);
    }

    /// Requests another poll.
    ///
    /// An `IDLE` task is re-queued; a `RUNNING` one is marked `NOTIFIED` so it
    /// is re-queued once its current poll returns.
    pub(crate) fn wake(self: Arc<Self>) {
        loop {
            match self.state.load(Ordering::Acquire) {
                IDLE => {
                    if self
                        .state
                        .compare_exchange(IDLE, QUEUED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        self.injector.push(self.clone());
                        return;
                    }
                }
                RUNNING => {
                    if self
                        .state
                        .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                }
                _ => return,
            }
        }
    }
}

/// Drives user work and settles its deferred unit.
///
/// - Before the first poll the cancellation signal is checked; a set signal
///   settles the unit as cancelled without running the work.
/// - `Ok(value)` completes the unit, `Err(OperationCancelled)` cancels it and
///   any other error faults it.
/// - A panic faults the unit with [`Error::Panicked`].
/// - Dropping the wrapper before the work finishes (runtime shutdown)
///   cancels the unit.
pub(crate) struct Guarded<F, T> {
    work: Option<Pin<Box<F>>>,
    cell: Arc<Cell<T>>,
    signal: Option<CancellationSignal>,
    started: bool,
}

impl<F, T> Guarded<F, T> {
    fn finish(&mut self, outcome: Result<T>) {
        if let Err(error) = &outcome
            && !error.is_cancelled()
        {
            tracing::debug!(unit = %self.cell.id(), %error, "unit faulted");
        }

        let _ = self.cell.settle(outcome);
        // Settled before the work (and anything it captured) is dropped.
        self.work = None;
    }
}

impl<F, T> Future for Guarded<F, T>
where
    F: Future<Output = Result<T>>,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();

        if !this.started {
            if this.signal.as_ref().is_some_and(CancellationSignal::is_set) {
                tracing::trace!(unit = %this.cell.id(), "signal set before start");
                this.finish(Err(Error::OperationCancelled));
                return Poll::Ready(());
            }

            this.started = true;
            this.cell.mark_running();
            tracing::trace!(unit = %this.cell.id(), "unit started");
        }

        let Some(work) = this.work.as_mut() else {
            return Poll::Ready(());
        };

        match panic::catch_unwind(AssertUnwindSafe(|| work.as_mut().poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(outcome)) => {
                this.finish(outcome);
                Poll::Ready(())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(unit = %this.cell.id(), panic = %message, "unit panicked");
                this.finish(Err(Error::Panicked(message)));
                Poll::Ready(())
            }
        }
    }
}

impl<F, T> Drop for Guarded<F, T> {
    fn drop(&mut self) {
        if self.work.is_some() && self.cell.settle(Err(Error::OperationCancelled)).is_ok() {
            tracing::debug!(unit = %self.cell.id(), "unit dropped before completion");
        }
    }
}

/// Creates the unit for `work` and, unless `signal` is already set, the
/// guarded future that drives it.
pub(crate) fn prepare<F, T>(
    work: F,
    signal: Option<&CancellationSignal>,
) -> (Deferred<T>, Option<Guarded<F, T>>)
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + Sync + 'static,
{
    let cell = Arc::new(Cell::new());
    let unit = Deferred::from_cell(cell.clone());

    if signal.is_some_and(CancellationSignal::is_set) {
        tracing::trace!(unit = %cell.id(), "signal set at submission");
        let _ = cell.settle(Err(Error::OperationCancelled));
        return (unit, None);
    }

    tracing::trace!(unit = %cell.id(), "unit submitted");

    let guarded = Guarded {
        work: Some(Box::pin(work)),
        cell,
        signal: signal.cloned(),
        started: false,
    };

    (unit, Some(guarded))
}

fn schedule<F, T>(work: F, signal: Option<&CancellationSignal>) -> Deferred<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + Sync + 'static,
{
    let injector =
        current_injector().expect("submit must be called within the context of a runtime");

    let (unit, guarded) = prepare(work, signal);
    let Some(guarded) = guarded else {
        return unit;
    };

    let task = Task::new(unit.id(), guarded, injector.clone());

    // Prefer the current worker's local queue for locality.
    let pushed_locally = CURRENT_WORKER_ID.with(|id_cell| {
        let Some(id) = *id_cell.borrow() else {
            return false;
        };

        CURRENT_LOCALS.with(|locals_cell| match locals_cell.borrow().as_ref() {
            Some(locals) if !injector.is_shutdown() => {
                locals[id].push(task.clone());
                true
            }
            _ => false,
        })
    });

    if !pushed_locally {
        injector.push(task);
    }

    unit
}

/// Submits fallible work to the current runtime.
///
/// The work is queued and polled by a worker once one is free. Its outcome
/// settles the returned unit: `Ok` completes it, `Err(OperationCancelled)`
/// cancels it, any other error faults it, and a panic faults it with
/// [`Error::Panicked`].
///
/// # Panics
///
/// Panics if called outside the context of a running runtime.
///
/// # Examples
///
/// ```rust,ignore
/// let unit = task::submit(async { Ok(2 + 2) });
/// assert_eq!(unit.await.unwrap(), 4);
/// ```
pub fn submit<F, T>(work: F) -> Deferred<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + Sync + 'static,
{
    schedule(work, None)
}

/// Submits fallible work that observes `signal`.
///
/// If the signal is already set the unit is cancelled immediately and the
/// work is never queued. If it becomes set while the unit waits in a queue,
/// the unit is cancelled without running. Once running, the work is expected
/// to check the signal itself and return `Err(OperationCancelled)`.
///
/// # Panics
///
/// Panics if called outside the context of a running runtime.
pub fn submit_cancellable<F, T>(work: F, signal: &CancellationSignal) -> Deferred<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + Sync + 'static,
{
    schedule(work, Some(signal))
}

/// Spawns an infallible future onto the current runtime.
///
/// The unit completes with the future's output, or faults if it panics.
///
/// # Panics
///
/// Panics if called outside the context of a running runtime.
pub fn spawn<F, T>(future: F) -> Deferred<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + Sync + 'static,
{
    schedule(async move { Ok(future.await) }, None)
}

/// Runs a synchronous closure on a worker.
///
/// The closure occupies the worker for its whole duration; long bodies
/// should check a [`CancellationSignal`] at safe points.
///
/// # Panics
///
/// Panics if called outside the context of a running runtime.
pub fn submit_fn<F, T>(f: F) -> Deferred<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + Sync + 'static,
{
    schedule(async move { f() }, None)
}
