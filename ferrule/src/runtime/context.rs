use crate::runtime::work_stealing::injector::InjectorHandle;
use crate::runtime::work_stealing::queue::LocalQueue;
use crate::time::driver::TimerHandle;

use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    /// Thread-local handle to the runtime timer driver.
    ///
    /// Lets `sleep` and `timeout` register deadlines without explicit
    /// parameter passing.
    pub(crate) static CURRENT_TIMER: RefCell<Option<TimerHandle>> =
        const { RefCell::new(None) };

    /// Thread-local handle to the global injector queue.
    ///
    /// `task::submit` uses it to schedule work from inside the runtime.
    pub(crate) static CURRENT_INJECTOR: RefCell<Option<InjectorHandle>> =
        const { RefCell::new(None) };

    /// Identifier of the current worker thread, if any.
    pub(crate) static CURRENT_WORKER_ID: RefCell<Option<usize>> =
        const { RefCell::new(None) };

    /// All local worker queues, indexed by worker id.
    pub(crate) static CURRENT_LOCALS: RefCell<Option<Arc<Vec<Arc<LocalQueue>>>>> =
        const { RefCell::new(None) };
}

/// Installs the runtime context (timer and injector handles) on the current
/// thread for the duration of `f`, restoring the previous context afterwards.
pub(crate) fn enter_context<R>(
    timer: TimerHandle,
    injector: InjectorHandle,
    f: impl FnOnce() -> R,
) -> R {
    CURRENT_TIMER.with(|t| {
        CURRENT_INJECTOR.with(|i| {
            let prev_t = t.replace(Some(timer));
            let prev_i = i.replace(Some(injector));

            let out = f();

            i.replace(prev_i);
            t.replace(prev_t);

            out
        })
    })
}

/// Returns the injector of the runtime the current thread belongs to.
pub(crate) fn current_injector() -> Option<InjectorHandle> {
    CURRENT_INJECTOR.with(|cell| cell.borrow().clone())
}

/// Returns the timer handle of the runtime the current thread belongs to.
pub(crate) fn current_timer() -> Option<TimerHandle> {
    CURRENT_TIMER.with(|cell| cell.borrow().clone())
}
