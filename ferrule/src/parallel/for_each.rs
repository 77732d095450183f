use crate::cancel::CancellationSignal;
use crate::combinator::when_all;
use crate::deferred::Deferred;
use crate::error::{Error, Result, panic_message};
use crate::task;

use std::fmt;
use std::future::Future;
use std::iter::{Enumerate, Peekable};
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const NO_STOP: usize = usize::MAX;

/// Options for [`for_each_bounded_with`].
#[derive(Debug, Clone)]
pub struct LoopOptions {
    max_concurrency: usize,
    signal: Option<CancellationSignal>,
}

impl LoopOptions {
    /// Options admitting at most `max_concurrency` concurrent bodies.
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrency == 0`.
    pub fn new(max_concurrency: usize) -> Self {
        assert!(max_concurrency > 0, "max_concurrency must be > 0");

        Self {
            max_concurrency,
            signal: None,
        }
    }

    /// Stops admitting items once `signal` is set. Bodies can read the
    /// signal through [`LoopState::signal`].
    pub fn signal(mut self, signal: &CancellationSignal) -> Self {
        self.signal = Some(signal.clone());
        self
    }
}

/// Summary of a finished loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopResult {
    /// `true` if every item was processed without a stop or break request.
    pub completed: bool,

    /// Lowest index from which [`LoopState::request_stop`] was called.
    pub lowest_stop_index: Option<usize>,

    /// Whether [`LoopState::request_break`] was called.
    pub broken: bool,

    /// Number of body invocations that ran to completion.
    pub processed: usize,
}

/// Per-invocation view of the loop, handed to every body call.
///
/// Neither request interrupts a running body; both only stop admission.
/// Items are admitted strictly in sequence order, so when the body at index
/// `i` asks to stop, every item at or before `i` has already been admitted
/// and will run to completion.
#[derive(Clone)]
pub struct LoopState {
    index: usize,
    control: Arc<Control>,
}

impl LoopState {
    /// Position of the current item in the input sequence.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Stops admission after the current position.
    ///
    /// Invocations already admitted keep running. Those past the lowest stop
    /// position see [`should_exit`](Self::should_exit) return `true`; those
    /// at or before it do not.
    pub fn request_stop(&self) {
        let _gate = self.control.gate();
        self.control.lowest_stop.fetch_min(self.index, Ordering::AcqRel);
    }

    /// Stops admission as soon as possible.
    ///
    /// Invocations already admitted keep running, and every one of them sees
    /// [`should_exit`](Self::should_exit) return `true`.
    pub fn request_break(&self) {
        let _gate = self.control.gate();
        self.control.broken.store(true, Ordering::Release);
    }

    /// Cooperative hint: `true` if this invocation may return early.
    ///
    /// Set after a break, for invocations past the lowest stop position, after
    /// another body failed, and once the loop's signal is set.
    pub fn should_exit(&self) -> bool {
        self.control.broken.load(Ordering::Acquire)
            || self.index > self.control.lowest_stop.load(Ordering::Acquire)
            || self.control.faulted.load(Ordering::Acquire)
            || self.control.signal.as_ref().is_some_and(CancellationSignal::is_set)
    }

    /// Lowest index that requested a stop so far.
    pub fn lowest_stop_index(&self) -> Option<usize> {
        self.control.lowest_stop()
    }

    /// The loop's cancellation signal, if one was configured.
    pub fn signal(&self) -> Option<&CancellationSignal> {
        self.control.signal.as_ref()
    }
}

impl fmt::Debug for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopState")
            .field("index", &self.index)
            .field("should_exit", &self.should_exit())
            .finish()
    }
}

/// Shared loop bookkeeping.
struct Control {
    /// Serializes admission against stop and break requests, so that no
    /// item is admitted once a request has returned.
    gate: Mutex<()>,

    broken: AtomicBool,
    lowest_stop: AtomicUsize,
    faulted: AtomicBool,
    cancelled: AtomicBool,
    exhausted: AtomicBool,
    processed: AtomicUsize,

    /// Body errors tagged with the item index.
    errors: Mutex<Vec<(usize, Error)>>,

    signal: Option<CancellationSignal>,
}

impl Control {
    fn gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lowest_stop(&self) -> Option<usize> {
        match self.lowest_stop.load(Ordering::Acquire) {
            NO_STOP => None,
            index => Some(index),
        }
    }

    /// Whether admission is closed. Callers hold the gate.
    fn halted(&self) -> bool {
        self.broken.load(Ordering::Acquire)
            || self.lowest_stop.load(Ordering::Acquire) != NO_STOP
            || self.faulted.load(Ordering::Acquire)
            || self.cancelled.load(Ordering::Acquire)
            || self.signal.as_ref().is_some_and(CancellationSignal::is_set)
    }

    fn record(&self, index: usize, outcome: Result<()>) {
        match outcome {
            Ok(()) => {
                self.processed.fetch_add(1, Ordering::AcqRel);
            }
            Err(Error::OperationCancelled) => {
                self.cancelled.store(true, Ordering::Release);
            }
            Err(error) => {
                tracing::debug!(index, %error, "loop body faulted");
                self.faulted.store(true, Ordering::Release);
                self.errors
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((index, error));
            }
        }
    }

    /// Builds the loop outcome once every lane has drained.
    fn finish(&self, lanes: &Result<Vec<()>>) -> Result<LoopResult> {
        let mut errors = mem::take(
            &mut *self
                .errors
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        errors.sort_by_key(|(index, _)| *index);

        let mut faults: Vec<Error> = errors.into_iter().map(|(_, error)| error).collect();
        if let Err(error) = lanes
            && !error.is_cancelled()
        {
            faults.extend(error.errors().iter().cloned());
        }

        if !faults.is_empty() {
            return Err(Error::Aggregate(faults));
        }

        let signalled = self.signal.as_ref().is_some_and(CancellationSignal::is_set)
            && !self.exhausted.load(Ordering::Acquire);

        // A lane only ends cancelled when the runtime dropped it.
        let abandoned = lanes.as_ref().is_err_and(Error::is_cancelled);

        if self.cancelled.load(Ordering::Acquire) || signalled || abandoned {
            return Err(Error::OperationCancelled);
        }

        let broken = self.broken.load(Ordering::Acquire);
        let lowest_stop_index = self.lowest_stop();

        Ok(LoopResult {
            completed: !broken && lowest_stop_index.is_none(),
            lowest_stop_index,
            broken,
            processed: self.processed.load(Ordering::Acquire),
        })
    }
}

type Items<I> = Peekable<Enumerate<Box<dyn Iterator<Item = I> + Send>>>;

/// Hands out items in sequence order.
struct Feeder<I> {
    items: Mutex<Items<I>>,
}

impl<I> Feeder<I> {
    fn admit(&self, control: &Control) -> Option<(usize, I)> {
        let _gate = control.gate();
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);

        if control.halted() {
            // A halt after the last item did not cut the input short.
            if items.peek().is_none() {
                control.exhausted.store(true, Ordering::Release);
            }
            return None;
        }

        let next = items.next();
        if next.is_none() {
            control.exhausted.store(true, Ordering::Release);
        }

        next
    }
}

/// Runs `body` for every item with at most `max_concurrency` invocations in
/// flight.
///
/// Shorthand for [`for_each_bounded_with`] with [`LoopOptions::new`].
///
/// # Panics
///
/// Panics if `max_concurrency == 0` or if called outside a running runtime.
///
/// # Examples
///
/// ```rust,ignore
/// let result = for_each_bounded(urls, 4, |url, state| async move {
///     if fetch(&url).await?.is_last_page() {
///         state.request_stop();
///     }
///     Ok(())
/// })
/// .await?;
/// ```
pub fn for_each_bounded<S, I, F, Fut>(
    items: S,
    max_concurrency: usize,
    body: F,
) -> Deferred<LoopResult>
where
    S: IntoIterator<Item = I>,
    S::IntoIter: Send + 'static,
    I: Send + 'static,
    F: Fn(I, LoopState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    for_each_bounded_with(items, LoopOptions::new(max_concurrency), body)
}

/// Runs `body` for every item under `options`.
///
/// Each body invocation is submitted to the scheduler as its own unit, so a
/// panicking body faults like an erroring one. The returned unit settles
/// once every admitted invocation has finished:
///
/// - faulted with [`Error::Aggregate`] of every body error (in item order),
/// - else cancelled if a body returned `Err(OperationCancelled)` or the
///   signal stopped admission before the input was exhausted,
/// - else completed with a [`LoopResult`].
///
/// # Panics
///
/// Panics if called outside a running runtime.
pub fn for_each_bounded_with<S, I, F, Fut>(
    items: S,
    options: LoopOptions,
    body: F,
) -> Deferred<LoopResult>
where
    S: IntoIterator<Item = I>,
    S::IntoIter: Send + 'static,
    I: Send + 'static,
    F: Fn(I, LoopState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let items: Box<dyn Iterator<Item = I> + Send> = Box::new(items.into_iter());

    let lanes = match items.size_hint() {
        (_, Some(upper)) => upper.min(options.max_concurrency),
        (_, None) => options.max_concurrency,
    };

    let control = Arc::new(Control {
        gate: Mutex::new(()),
        broken: AtomicBool::new(false),
        lowest_stop: AtomicUsize::new(NO_STOP),
        faulted: AtomicBool::new(false),
        cancelled: AtomicBool::new(false),
        exhausted: AtomicBool::new(false),
        processed: AtomicUsize::new(0),
        errors: Mutex::new(Vec::new()),
        signal: options.signal,
    });

    let feeder = Arc::new(Feeder {
        items: Mutex::new(items.enumerate().peekable()),
    });
    let body = Arc::new(body);

    tracing::trace!(lanes, max = options.max_concurrency, "bounded loop started");

    let lanes: Vec<Deferred<()>> = (0..lanes)
        .map(|_| {
            let control = control.clone();
            let feeder = feeder.clone();
            let body = body.clone();

            task::submit(async move {
                while let Some((index, item)) = feeder.admit(&control) {
                    let state = LoopState {
                        index,
                        control: control.clone(),
                    };

                    let invocation =
                        match panic::catch_unwind(AssertUnwindSafe(|| body(item, state))) {
                            Ok(invocation) => invocation,
                            Err(payload) => {
                                let message = panic_message(payload.as_ref());
                                control.record(index, Err(Error::Panicked(message)));
                                continue;
                            }
                        };

                    let outcome = match &control.signal {
                        Some(signal) => task::submit_cancellable(invocation, signal).await,
                        None => task::submit(invocation).await,
                    };

                    control.record(index, outcome);
                }

                Ok(())
            })
        })
        .collect();

    when_all(lanes).then(move |lanes| control.finish(lanes))
}
