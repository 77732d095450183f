use crate::runtime::context::{CURRENT_LOCALS, CURRENT_WORKER_ID};
use crate::runtime::task::Task;
use crate::runtime::work_stealing::injector::InjectorHandle;
use crate::runtime::work_stealing::queue::LocalQueue;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One execution slot of the pool.
///
/// Looks for work in this order:
/// 1. its own local queue,
/// 2. the global injector,
/// 3. other workers' local queues,
/// 4. otherwise parks briefly.
pub(crate) struct Worker {
    id: usize,

    /// All local queues, one per worker.
    locals: Arc<Vec<Arc<LocalQueue>>>,

    injector: InjectorHandle,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        locals: Arc<Vec<Arc<LocalQueue>>>,
        injector: InjectorHandle,
    ) -> Self {
        Self {
            id,
            locals,
            injector,
        }
    }

    /// Runs the worker loop until `shutdown` is raised.
    ///
    /// Expects the runtime context to be installed on the current thread.
    pub(crate) fn run(&self, shutdown: Arc<AtomicBool>) {
        CURRENT_WORKER_ID.with(|id| *id.borrow_mut() = Some(self.id));
        CURRENT_LOCALS.with(|locals| *locals.borrow_mut() = Some(self.locals.clone()));

        tracing::trace!(worker = self.id, "worker started");

        while !shutdown.load(Ordering::Acquire) {
            let next = self.locals[self.id]
                .pop()
                .or_else(|| self.injector.steal())
                .or_else(|| self.try_steal());

            match next {
                Some(task) => task.run(),
                None => self.injector.park(),
            }
        }

        CURRENT_LOCALS.with(|locals| *locals.borrow_mut() = None);
        CURRENT_WORKER_ID.with(|id| *id.borrow_mut() = None);

        tracing::trace!(worker = self.id, "worker stopped");
    }

    /// Steals from the other workers, visiting them round-robin starting
    /// after this one.
    fn try_steal(&self) -> Option<Arc<Task>> {
        let len = self.locals.len();

        if len <= 1 {
            return None;
        }

        (1..len)
            .map(|i| (self.id + i) % len)
            .find_map(|victim| self.locals[victim].steal())
    }
}
