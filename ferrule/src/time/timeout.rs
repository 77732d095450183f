use crate::error::{Error, Result};
use crate::time::sleep::{Sleep, sleep};

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Bounds `future` by `duration`.
///
/// Resolves to `Ok(output)` if the future finishes first and to
/// `Err(Error::TimedOut)` otherwise. The inner future is simply dropped on
/// expiry; work it spawned keeps running unless it observes a cancellation
/// signal.
///
/// # Examples
///
/// ```rust,ignore
/// let unit = task::spawn(async { 123 });
/// let value = timeout(Duration::from_millis(50), unit).await??;
/// ```
pub fn timeout<F>(duration: Duration, future: F) -> Timeout<F>
where
    F: Future,
{
    Timeout {
        future,
        sleep: sleep(duration),
    }
}

/// Future returned by [`timeout`].
pub struct Timeout<F> {
    future: F,
    sleep: Sleep,
}

impl<F> Future for Timeout<F>
where
    F: Future,
{
    type Output = Result<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Safety: neither field is moved out of the pinned struct.
        let this = unsafe { self.get_unchecked_mut() };

        let future = unsafe { Pin::new_unchecked(&mut this.future) };
        if let Poll::Ready(val) = future.poll(cx) {
            return Poll::Ready(Ok(val));
        }

        if let Poll::Ready(()) = Pin::new(&mut this.sleep).poll(cx) {
            return Poll::Ready(Err(Error::TimedOut));
        }

        Poll::Pending
    }
}
