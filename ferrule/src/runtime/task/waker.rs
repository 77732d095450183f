use crate::runtime::task::Task;

use std::mem;
use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

/// Vtable of wakers backed by an `Arc<Task>`.
///
/// Every function upholds the [`RawWaker`] contract: the data pointer comes
/// from `Arc::into_raw` and each clone owns one strong count.
static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, wake_raw, wake_by_ref_raw, drop_raw);

/// Creates a waker that re-queues `task` when woken.
pub(crate) fn make_waker(task: Arc<Task>) -> Waker {
    unsafe { Waker::from_raw(RawWaker::new(Arc::into_raw(task) as *const (), &VTABLE)) }
}

fn clone_raw(ptr: *const ()) -> RawWaker {
    let arc = unsafe { Arc::<Task>::from_raw(ptr as *const Task) };
    let cloned = arc.clone();
    mem::forget(arc);

    RawWaker::new(Arc::into_raw(cloned) as *const (), &VTABLE)
}

/// Consumes the waker's strong count.
fn wake_raw(ptr: *const ()) {
    let arc = unsafe { Arc::<Task>::from_raw(ptr as *const Task) };
    arc.wake();
}

fn wake_by_ref_raw(ptr: *const ()) {
    let arc = unsafe { Arc::<Task>::from_raw(ptr as *const Task) };
    arc.clone().wake();
    mem::forget(arc);
}

fn drop_raw(ptr: *const ()) {
    unsafe { drop(Arc::<Task>::from_raw(ptr as *const Task)) };
}
