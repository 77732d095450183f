use crate::runtime::task::Task;

use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A per-worker local task queue.
///
/// The owning worker pushes and pops at the back (LIFO) for cache locality;
/// other workers steal from the front (FIFO).
pub(crate) struct LocalQueue {
    inner: Mutex<VecDeque<Arc<Task>>>,
}

impl LocalQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, VecDeque<Arc<Task>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, task: Arc<Task>) {
        self.inner().push_back(task);
    }

    pub(crate) fn pop(&self) -> Option<Arc<Task>> {
        self.inner().pop_back()
    }

    pub(crate) fn steal(&self) -> Option<Arc<Task>> {
        self.inner().pop_front()
    }

    /// Removes every queued task without dropping them under the lock.
    pub(crate) fn drain(&self) -> VecDeque<Arc<Task>> {
        mem::take(&mut *self.inner())
    }
}
