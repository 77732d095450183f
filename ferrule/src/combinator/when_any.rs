use crate::deferred::{CompletionSource, Deferred};
use crate::error::Error;

/// Resolves with the first unit to reach any terminal state.
///
/// Completion, fault and cancellation all count as finishing: the aggregate
/// completes with the winning unit itself, and the caller inspects its
/// outcome. The remaining units are neither cancelled nor awaited; signal
/// them explicitly if they should stop.
///
/// An empty input faults with [`Error::EmptyInput`].
///
/// # Examples
///
/// ```rust,ignore
/// let winner = when_any([slow, fast.clone()]).await?;
/// assert_eq!(winner.id(), fast.id());
/// ```
pub fn when_any<T, I>(units: I) -> Deferred<Deferred<T>>
where
    T: Send + Sync + 'static,
    I: IntoIterator<Item = Deferred<T>>,
{
    let units: Vec<Deferred<T>> = units.into_iter().collect();

    if units.is_empty() {
        return Deferred::faulted(Error::EmptyInput);
    }

    let source = CompletionSource::new();
    let winner = source.deferred();

    for unit in &units {
        let source = source.clone();
        let candidate = unit.clone();

        unit.on_complete(move |_| {
            if source.complete(candidate).is_ok() {
                tracing::trace!(unit = %source.deferred().id(), "when_any decided");
            }
        });
    }

    winner
}
