use crate::deferred::{CompletionSource, Deferred};
use crate::error::{Error, Result};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Waits for every unit to reach a terminal state.
///
/// The aggregate is:
/// - **faulted** with [`Error::Aggregate`] holding every fault, in input
///   order, if any input faulted,
/// - otherwise **cancelled** if any input was cancelled,
/// - otherwise **completed** with the values in input order, regardless of
///   the order in which the inputs finished.
///
/// An empty input completes immediately with an empty vector.
///
/// # Examples
///
/// ```rust,ignore
/// let a = task::spawn(async { 1 });
/// let b = task::spawn(async { 2 });
/// assert_eq!(when_all([a, b]).await.unwrap(), vec![1, 2]);
/// ```
pub fn when_all<T, I>(units: I) -> Deferred<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Deferred<T>>,
{
    let units: Arc<Vec<Deferred<T>>> = Arc::new(units.into_iter().collect());

    if units.is_empty() {
        return Deferred::completed(Vec::new());
    }

    let source = CompletionSource::new();
    let aggregate = source.deferred();
    let remaining = Arc::new(AtomicUsize::new(units.len()));

    tracing::trace!(unit = %aggregate.id(), inputs = units.len(), "when_all registered");

    for unit in units.iter() {
        let units = units.clone();
        let remaining = remaining.clone();
        let source = source.clone();

        unit.on_complete(move |_| {
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                let _ = source.settle(collect(&units));
            }
        });
    }

    aggregate
}

/// Folds the terminal outcomes of `units` into the aggregate outcome.
fn collect<T: Clone>(units: &[Deferred<T>]) -> Result<Vec<T>> {
    let mut values = Vec::with_capacity(units.len());
    let mut faults = Vec::new();
    let mut cancelled = false;

    for unit in units {
        match unit.outcome() {
            Some(Ok(value)) => values.push(value.clone()),
            Some(Err(Error::OperationCancelled)) | None => cancelled = true,
            Some(Err(error)) => faults.push(error.clone()),
        }
    }

    if !faults.is_empty() {
        Err(Error::Aggregate(faults))
    } else if cancelled {
        Err(Error::OperationCancelled)
    } else {
        Ok(values)
    }
}
