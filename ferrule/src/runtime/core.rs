use crate::cancel::CancellationSignal;
use crate::deferred::Deferred;
use crate::error::Result;
use crate::runtime::executor::core::Executor;
use crate::runtime::task::prepare;
use crate::time::driver::TimerDriver;

use std::future::Future;
use std::sync::mpsc;

/// The main runtime handle.
///
/// `Runtime` is responsible for:
/// - submitting work onto the worker pool,
/// - driving execution through the executor,
/// - owning the timer thread used by `sleep` and `timeout`,
/// - providing a synchronous entry point via [`block_on`](Self::block_on).
///
/// Dropping the runtime stops the workers, then cancels every unit that is
/// still queued.
pub struct Runtime {
    executor: Executor,

    timer: TimerDriver,

    worker_threads: usize,
}

impl Runtime {
    pub(crate) fn new(worker_threads: usize, thread_name: &str) -> Self {
        let timer = TimerDriver::start(thread_name);
        let executor = Executor::new(timer.handle(), worker_threads, thread_name);

        Self {
            executor,
            timer,
            worker_threads,
        }
    }

    /// Number of worker threads, i.e. the pool capacity.
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Submits fallible work from outside the runtime.
    ///
    /// Behaves like [`task::submit`](crate::task::submit) or, when `signal`
    /// is given, [`task::submit_cancellable`](crate::task::submit_cancellable).
    pub fn submit<F, T>(&self, work: F, signal: Option<&CancellationSignal>) -> Deferred<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let (unit, guarded) = prepare(work, signal);

        if let Some(guarded) = guarded {
            self.executor.spawn(unit.id(), guarded);
        }

        unit
    }

    /// Spawns an infallible future from outside the runtime.
    pub fn spawn<F, T>(&self, future: F) -> Deferred<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.submit(async move { Ok(future.await) }, None)
    }

    /// Runs a future to completion, blocking the current thread.
    ///
    /// Must not be called from a worker thread of the same runtime.
    ///
    /// # Panics
    ///
    /// Panics if the future panics or if the runtime shuts down before the
    /// future completes.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let result = runtime.block_on(async { 42 });
    /// assert_eq!(result, 42);
    /// ```
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (transmitter, receiver) = mpsc::channel();

        let unit = self.spawn(async move {
            let result = future.await;
            let _ = transmitter.send(result);
        });

        match receiver.recv() {
            Ok(result) => result,
            Err(_) => match unit.outcome() {
                Some(Err(error)) => panic!("block_on future failed: {error}"),
                _ => panic!("runtime shut down before the future completed"),
            },
        }
    }
}

impl Drop for Runtime {
    /// Shuts the runtime down:
    /// 1. stops submission and signals the workers,
    /// 2. joins the workers and cancels what is left in the queues,
    /// 3. stops the timer thread.
    fn drop(&mut self) {
        self.executor.shutdown();
        self.executor.join();
        self.timer.shutdown();
    }
}
