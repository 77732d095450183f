use crate::deferred::UnitId;
use crate::runtime::context::enter_context;
use crate::runtime::executor::worker::Worker;
use crate::runtime::task::Task;
use crate::runtime::work_stealing::injector::Injector;
use crate::runtime::work_stealing::queue::LocalQueue;
use crate::time::driver::TimerHandle;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// The bounded worker pool.
///
/// Owns a fixed number of worker threads, the global injector and one local
/// queue per worker. At most `threads` units are polled at any instant;
/// everything else waits in a queue.
pub(crate) struct Executor {
    injector: Arc<Injector>,

    locals: Arc<Vec<Arc<LocalQueue>>>,

    handles: Vec<JoinHandle<()>>,

    /// Shutdown flag shared with all workers.
    shutdown: Arc<AtomicBool>,
}

impl Executor {
    /// Spawns `threads` named workers, each running inside the runtime
    /// context.
    pub(crate) fn new(timer: TimerHandle, threads: usize, thread_name: &str) -> Self {
        let injector = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Arc<Vec<_>> = Arc::new(
            (0..threads)
                .map(|_| Arc::new(LocalQueue::new()))
                .collect(),
        );

        let mut handles = Vec::with_capacity(threads);

        for id in 0..threads {
            let worker = Worker::new(id, locals.clone(), injector.clone());

            let timer = timer.clone();
            let sd = shutdown.clone();
            let injector = injector.clone();

            let handle = thread::Builder::new()
                .name(format!("{thread_name}-{id}"))
                .spawn(move || {
                    enter_context(timer, injector, || worker.run(sd));
                })
                .expect("failed to spawn worker thread");

            handles.push(handle);
        }

        tracing::debug!(workers = threads, "executor started");

        Self {
            injector,
            locals,
            handles,
            shutdown,
        }
    }

    /// Signals all workers to stop and wakes the parked ones.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.injector.shutdown();
    }

    /// Queues a future on the global injector.
    ///
    /// After shutdown the future is dropped, which cancels the unit it
    /// drives.
    pub(crate) fn spawn<F>(&self, unit: UnitId, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.shutdown.load(Ordering::Acquire) {
            tracing::debug!(%unit, "submission after shutdown dropped");
            return;
        }

        let task = Task::new(unit, future, self.injector.clone());
        self.injector.push(task);
    }

    /// Joins every worker, then aborts every task that has not finished,
    /// whether queued or suspended. Aborting a task cancels its unit.
    pub(crate) fn join(&mut self) {
        for h in self.handles.drain(..) {
            let _ = h.join();
        }

        let queued = self.injector.drain();
        let locals: Vec<_> = self.locals.iter().map(|local| local.drain()).collect();

        let live = self.injector.registry().close();
        for task in &live {
            task.abort();
        }

        drop(queued);
        drop(locals);

        tracing::debug!(abandoned = live.len(), "executor stopped");
    }
}
