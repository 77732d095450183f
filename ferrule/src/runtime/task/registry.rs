use super::Task;
use crate::utils::Slab;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Every task of a runtime that has not finished yet.
///
/// A task suspended on a unit or a signal may only be reachable through a
/// reference cycle (task, future, waker, task). The registry keeps a handle
/// to each live task so shutdown can still reach and abort it.
pub(crate) struct TaskRegistry {
    inner: Mutex<State>,
}

struct State {
    tasks: Slab<Arc<Task>>,

    /// Set at shutdown; later registrations are refused.
    closed: bool,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(State {
                tasks: Slab::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tracks `task` until it retires. Returns `None` once closed.
    pub(crate) fn insert(&self, task: Arc<Task>) -> Option<usize> {
        let mut state = self.lock();

        if state.closed {
            return None;
        }

        Some(state.tasks.insert(task))
    }

    /// Forgets a retired task.
    pub(crate) fn remove(&self, key: usize) {
        let task = self.lock().tasks.remove(key);
        drop(task);
    }

    /// Refuses further registrations and hands back every live task.
    pub(crate) fn close(&self) -> Vec<Arc<Task>> {
        let mut state = self.lock();
        state.closed = true;

        tracing::trace!(live = state.tasks.len(), "task registry closed");
        state.tasks.drain()
    }
}
