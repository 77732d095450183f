use crate::runtime::task::{Task, TaskRegistry};

use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Shared handle to the global task injector.
pub(crate) type InjectorHandle = Arc<Injector>;

/// Global queue of the work-stealing scheduler.
///
/// Newly submitted units and units woken from outside a worker land here
/// before a worker picks them up. The injector also parks idle workers on a
/// condition variable.
pub(crate) struct Injector {
    queue: Mutex<VecDeque<Arc<Task>>>,

    /// Number of workers currently parked.
    parked: Mutex<usize>,

    condvar: Condvar,

    shutdown: AtomicBool,

    /// Every unfinished task, queued or not.
    registry: TaskRegistry,
}

impl Injector {
    pub(crate) fn new() -> Self {
        Injector {
            queue: Mutex::new(VecDeque::new()),
            parked: Mutex::new(0),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
            registry: TaskRegistry::new(),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Arc<Task>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Signals shutdown and wakes all parked workers.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    pub(crate) fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Pushes a task and wakes one parked worker.
    ///
    /// After shutdown the task is dropped instead of queued, which settles
    /// its unit as cancelled once the last reference goes away.
    pub(crate) fn push(&self, task: Arc<Task>) {
        if self.is_shutdown() {
            return;
        }

        self.queue().push_back(task);

        if *self.parked.lock().unwrap_or_else(PoisonError::into_inner) > 0 {
            self.condvar.notify_one();
        }
    }

    /// Parks the current worker until work arrives or shutdown begins.
    ///
    /// The wait is bounded so that work pushed onto another worker's local
    /// queue is eventually stolen.
    pub(crate) fn park(&self) {
        if self.is_shutdown() || !self.queue().is_empty() {
            return;
        }

        let mut parked = self.parked.lock().unwrap_or_else(PoisonError::into_inner);
        *parked += 1;

        let (mut parked, _) = self
            .condvar
            .wait_timeout(parked, Duration::from_millis(1))
            .unwrap_or_else(PoisonError::into_inner);

        *parked -= 1;
    }

    /// Takes a task from the front of the queue.
    pub(crate) fn steal(&self) -> Option<Arc<Task>> {
        self.queue().pop_front()
    }

    /// Removes every queued task.
    ///
    /// The tasks are returned rather than dropped in place so their drop
    /// glue, which may wake other tasks, runs without the lock held.
    pub(crate) fn drain(&self) -> VecDeque<Arc<Task>> {
        mem::take(&mut *self.queue())
    }
}
