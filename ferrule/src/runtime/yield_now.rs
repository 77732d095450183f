use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future that is pending exactly once.
struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    /// The first poll wakes its own task and returns `Pending`, which puts
    /// the task back in a run queue; the second poll completes.
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }

        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Hands the worker back to the scheduler once.
///
/// Long-running work can call this between steps so that other queued
/// units get a turn on a small pool.
///
/// ```rust,ignore
/// for step in steps {
///     step.run();
///     yield_now().await;
/// }
/// ```
pub async fn yield_now() {
    YieldNow { yielded: false }.await
}
