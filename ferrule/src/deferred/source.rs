use super::{Cell, Deferred};
use crate::error::{Error, Result};

use std::sync::Arc;

/// Manually settable producer side of a [`Deferred`].
///
/// A `CompletionSource` bridges push-style events (a callback fired by a
/// foreign library, a child-process exit notification, ...) into the
/// deferred abstraction without polling. Any clone may settle the unit; the
/// first settle wins and every later attempt returns
/// [`Error::AlreadySettled`].
///
/// If every clone is dropped without settling, the unit is settled as
/// cancelled so that waiters never hang.
///
/// # Examples
///
/// ```rust,ignore
/// let source = CompletionSource::new();
/// let unit = source.deferred();
///
/// std::thread::spawn(move || {
///     let _ = source.complete(42);
/// });
///
/// assert_eq!(unit.await.unwrap(), 42);
/// ```
pub struct CompletionSource<T: Send + Sync + 'static> {
    shared: Arc<Shared<T>>,
}

/// Keeps the cell alive and settles it on drop if nobody else did.
struct Shared<T: Send + Sync + 'static> {
    cell: Arc<Cell<T>>,
}

impl<T: Send + Sync + 'static> CompletionSource<T> {
    /// Creates a source owning a fresh pending unit.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                cell: Arc::new(Cell::new()),
            }),
        }
    }

    /// Returns a handle to the owned unit.
    pub fn deferred(&self) -> Deferred<T> {
        Deferred::from_cell(self.shared.cell.clone())
    }

    /// Settles the unit with `outcome`.
    ///
    /// `Err(Error::OperationCancelled)` settles it as cancelled; any other
    /// error settles it as faulted.
    pub fn settle(&self, outcome: Result<T>) -> Result<()> {
        self.shared.cell.settle(outcome)
    }

    /// Completes the unit with `value`.
    pub fn complete(&self, value: T) -> Result<()> {
        self.settle(Ok(value))
    }

    /// Faults the unit with `error`.
    pub fn fail(&self, error: Error) -> Result<()> {
        self.settle(Err(error))
    }

    /// Cancels the unit.
    pub fn cancel(&self) -> Result<()> {
        self.settle(Err(Error::OperationCancelled))
    }

    /// Returns `true` once the unit has been settled by any clone.
    pub fn is_settled(&self) -> bool {
        self.shared.cell.outcome().is_some()
    }
}

impl<T: Send + Sync + 'static> Clone for CompletionSource<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Default for CompletionSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Drop for Shared<T> {
    fn drop(&mut self) {
        if self.cell.settle(Err(Error::OperationCancelled)).is_ok() {
            tracing::debug!(unit = %self.cell.id(), "completion source dropped unsettled");
        }
    }
}
