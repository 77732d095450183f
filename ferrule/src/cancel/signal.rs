use crate::error::{Error, Result, panic_message};
use crate::task;
use crate::time::sleep;

use std::fmt;
use std::future::Future;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

type Callback = Box<dyn FnOnce() + Send>;

/// A shared, monotonic cancellation flag with observer callbacks.
///
/// Clones share the same flag. Once [`set`](Self::set) has been called the
/// signal stays set forever. Callbacks registered with
/// [`on_set`](Self::on_set) fire exactly once, in registration order,
/// synchronously on the thread that calls `set`. A callback registered after
/// the signal is set runs immediately on the registering thread.
///
/// Cancellation is cooperative: setting the signal never interrupts running
/// work. Work observes it through [`check`](Self::check) or
/// [`cancelled`](Self::cancelled) and exits on its own.
#[derive(Clone)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

struct Inner {
    /// Written only while `callbacks` is locked.
    set: AtomicBool,

    callbacks: Mutex<Callbacks>,

    /// Callbacks this signal registered on its parents, see
    /// [`CancellationSignal::linked`].
    links: Mutex<Vec<Registration>>,
}

struct Callbacks {
    next_id: u64,
    entries: Vec<(u64, Callback)>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Callbacks> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    /// Detaches a linked child from its parents.
    fn drop(&mut self) {
        let links = mem::take(self.links.get_mut().unwrap_or_else(PoisonError::into_inner));
        for link in links {
            link.unregister();
        }
    }
}

impl CancellationSignal {
    /// Creates an unset signal.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                set: AtomicBool::new(false),
                callbacks: Mutex::new(Callbacks {
                    next_id: 0,
                    entries: Vec::new(),
                }),
                links: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Creates a signal that becomes set as soon as any of `parents` is set.
    ///
    /// If a parent is already set the returned signal is set immediately.
    /// Setting the child never affects the parents. The parents only hold
    /// the child weakly, and dropping the child removes its callbacks from
    /// them.
    pub fn linked(parents: &[&CancellationSignal]) -> Self {
        let child = Self::new();

        let links: Vec<Registration> = parents
            .iter()
            .map(|parent| {
                let weak = Arc::downgrade(&child.inner);
                parent.on_set(move || {
                    if let Some(inner) = weak.upgrade() {
                        CancellationSignal { inner }.set();
                    }
                })
            })
            .collect();

        *child
            .inner
            .links
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = links;

        child
    }

    /// Marks the signal as set and fires every registered callback.
    ///
    /// Idempotent: only the first call fires callbacks. Callbacks run on the
    /// calling thread, in registration order. A panicking callback is logged
    /// and does not prevent the remaining callbacks from running.
    pub fn set(&self) {
        let callbacks = {
            let mut callbacks = self.inner.lock();
            if self.inner.set.swap(true, Ordering::AcqRel) {
                return;
            }
            mem::take(&mut callbacks.entries)
        };

        tracing::trace!(callbacks = callbacks.len(), "cancellation signal set");

        for (_, callback) in callbacks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
                tracing::warn!(
                    panic = %panic_message(payload.as_ref()),
                    "cancellation callback panicked"
                );
            }
        }
    }

    /// Returns `true` once [`set`](Self::set) has been called.
    pub fn is_set(&self) -> bool {
        self.inner.set.load(Ordering::Acquire)
    }

    /// Registers `callback` to run when the signal is set.
    ///
    /// If the signal is already set the callback runs immediately on the
    /// calling thread and the returned registration is inert.
    pub fn on_set<F>(&self, callback: F) -> Registration
    where
        F: FnOnce() + Send + 'static,
    {
        let mut callbacks = self.inner.lock();

        if self.is_set() {
            drop(callbacks);
            callback();
            return Registration {
                signal: Weak::new(),
                id: None,
            };
        }

        let id = callbacks.next_id;
        callbacks.next_id += 1;
        callbacks.entries.push((id, Box::new(callback)));

        Registration {
            signal: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Fails with [`Error::OperationCancelled`] if the signal is set.
    ///
    /// Meant to be called at safe points inside long-running work:
    ///
    /// ```rust,ignore
    /// for chunk in chunks {
    ///     signal.check()?;
    ///     process(chunk);
    /// }
    /// ```
    pub fn check(&self) -> Result<()> {
        if self.is_set() {
            Err(Error::OperationCancelled)
        } else {
            Ok(())
        }
    }

    /// Returns a future that resolves once the signal is set.
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            signal: self.clone(),
            slot: None,
        }
    }

    /// Sets the signal after `duration` using the runtime timer.
    ///
    /// # Panics
    ///
    /// Panics if called outside the context of a running runtime.
    pub fn set_after(&self, duration: Duration) {
        let signal = self.clone();
        let _ = task::spawn(async move {
            sleep(duration).await;
            signal.set();
        });
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("set", &self.is_set())
            .finish()
    }
}

/// Handle to a callback registered with [`CancellationSignal::on_set`].
///
/// Dropping the handle keeps the callback registered.
#[derive(Debug)]
pub struct Registration {
    signal: Weak<Inner>,
    id: Option<u64>,
}

impl Registration {
    /// Removes the callback if it has not fired yet.
    ///
    /// Returns `true` if the callback was removed, `false` if it already
    /// fired (or is firing) or the signal is gone.
    pub fn unregister(self) -> bool {
        let (Some(inner), Some(id)) = (self.signal.upgrade(), self.id) else {
            return false;
        };

        let removed = {
            let mut callbacks = inner.lock();
            callbacks
                .entries
                .iter()
                .position(|(entry, _)| *entry == id)
                .map(|pos| callbacks.entries.remove(pos))
        };

        // Dropped outside the lock: the callback may own the last handle
        // to something that unregisters from this same signal.
        removed.is_some()
    }
}

/// Future returned by [`CancellationSignal::cancelled`].
pub struct Cancelled {
    signal: CancellationSignal,

    /// Waker slot shared with the registered callback, plus the
    /// registration so it can be removed on drop.
    slot: Option<(Arc<Mutex<Option<Waker>>>, Registration)>,
}

impl Future for Cancelled {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.signal.is_set() {
            return Poll::Ready(());
        }

        match &self.slot {
            Some((waker, _)) => {
                *waker.lock().unwrap_or_else(PoisonError::into_inner) = Some(cx.waker().clone());
            }
            None => {
                let waker = Arc::new(Mutex::new(Some(cx.waker().clone())));
                let shared = waker.clone();
                let registration = self.signal.on_set(move || {
                    let waker = shared.lock().unwrap_or_else(PoisonError::into_inner).take();
                    if let Some(waker) = waker {
                        waker.wake();
                    }
                });
                self.slot = Some((waker, registration));
            }
        }

        if self.signal.is_set() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl Drop for Cancelled {
    fn drop(&mut self) {
        if let Some((_, registration)) = self.slot.take() {
            registration.unregister();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn set_is_monotonic_under_contention() {
        let signal = CancellationSignal::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let _ = signal.on_set(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let signal = signal.clone();
                thread::spawn(move || {
                    signal.set();
                    assert!(signal.is_set());
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert!(signal.is_set());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_registration_fires_immediately() {
        let signal = CancellationSignal::new();
        signal.set();

        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let registration = signal.on_set(move || flag.store(true, Ordering::SeqCst));

        assert!(fired.load(Ordering::SeqCst));
        assert!(!registration.unregister());
    }

    #[test]
    fn unregistered_callback_never_fires() {
        let signal = CancellationSignal::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let registration = signal.on_set(move || flag.store(true, Ordering::SeqCst));
        assert!(registration.unregister());

        signal.set();
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn check_fails_once_set() {
        let signal = CancellationSignal::new();
        assert!(signal.check().is_ok());
        signal.set();
        assert!(matches!(signal.check(), Err(Error::OperationCancelled)));
    }

    #[test]
    fn linked_signal_follows_any_parent() {
        let a = CancellationSignal::new();
        let b = CancellationSignal::new();
        let child = CancellationSignal::linked(&[&a, &b]);

        assert!(!child.is_set());
        b.set();
        assert!(child.is_set());
        assert!(!a.is_set());
    }

    #[test]
    fn dropped_children_detach_from_their_parent() {
        let parent = CancellationSignal::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..1000 {
            let child = CancellationSignal::linked(&[&parent]);
            let counter = fired.clone();
            let _ = child.on_set(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(parent.inner.lock().entries.is_empty());

        parent.set();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn live_child_still_follows_its_parent() {
        let parent = CancellationSignal::new();
        let child = CancellationSignal::linked(&[&parent]);

        assert_eq!(parent.inner.lock().entries.len(), 1);

        parent.set();
        assert!(child.is_set());
    }
}
