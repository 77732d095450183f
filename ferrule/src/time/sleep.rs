use crate::runtime::context::current_timer;
use crate::time::driver::Command;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Creates a future that completes after `duration`.
///
/// # Panics
///
/// Panics if polled outside of a running runtime.
///
/// # Examples
///
/// ```rust,ignore
/// sleep(Duration::from_millis(10)).await;
/// ```
pub fn sleep(duration: Duration) -> Sleep {
    Sleep::new(Instant::now() + duration)
}

/// A future that completes once its deadline is reached.
///
/// The timer is registered with the runtime timer thread on first poll and
/// disarmed if the future is dropped early, so an abandoned sleep never wakes
/// its task.
pub struct Sleep {
    deadline: Instant,

    /// Whether the timer has been handed to the timer thread.
    registered: bool,

    /// Shared with the timer thread.
    cancelled: Arc<AtomicBool>,
}

impl Sleep {
    pub(crate) fn new(deadline: Instant) -> Self {
        Self {
            deadline,
            registered: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The instant at which this sleep completes.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if Instant::now() >= this.deadline {
            return Poll::Ready(());
        }

        if !this.registered {
            this.registered = true;

            let timer = current_timer().expect("Sleep polled outside of runtime");
            let _ = timer.send(Command::SetTimer {
                deadline: this.deadline,
                waker: cx.waker().clone(),
                cancelled: this.cancelled.clone(),
            });
        }

        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}
