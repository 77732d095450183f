use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicBool};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SendError, Sender};
use std::task::Waker;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Requests sent to the timer thread.
pub(crate) enum Command {
    SetTimer {
        deadline: Instant,
        waker: Waker,
        cancelled: Arc<AtomicBool>,
    },
    Shutdown,
}

/// Cloneable handle used to register timers.
#[derive(Clone)]
pub(crate) struct TimerHandle {
    sender: Sender<Command>,
}

impl TimerHandle {
    pub(crate) fn send(&self, command: Command) -> Result<(), SendError<Command>> {
        self.sender.send(command)
    }
}

/// Owns the timer thread of a runtime.
///
/// The thread keeps a min-heap of deadlines and sleeps until the earliest one
/// or until a new command arrives, whichever comes first.
pub(crate) struct TimerDriver {
    handle: TimerHandle,
    thread: Option<JoinHandle<()>>,
}

impl TimerDriver {
    pub(crate) fn start(thread_name: &str) -> Self {
        let (sender, receiver) = mpsc::channel();

        let thread = thread::Builder::new()
            .name(format!("{thread_name}-timer"))
            .spawn(move || run(receiver))
            .expect("failed to spawn timer thread");

        Self {
            handle: TimerHandle { sender },
            thread: Some(thread),
        }
    }

    pub(crate) fn handle(&self) -> TimerHandle {
        self.handle.clone()
    }

    /// Stops the timer thread and waits for it. Pending timers never fire.
    pub(crate) fn shutdown(&mut self) {
        let _ = self.handle.send(Command::Shutdown);

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// An entry in the timer heap.
struct TimerEntry {
    deadline: Instant,
    waker: Waker,

    /// Raised when the owning sleep is dropped.
    cancelled: Arc<AtomicBool>,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline.eq(&other.deadline)
    }
}

impl Ord for TimerEntry {
    /// Reversed so that `BinaryHeap` pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.deadline.cmp(&self.deadline)
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn run(receiver: Receiver<Command>) {
    let mut timers = BinaryHeap::new();

    loop {
        let command = match timers.peek() {
            Some(TimerEntry { deadline, .. }) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                receiver.recv_timeout(wait)
            }
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match command {
            Ok(Command::SetTimer {
                deadline,
                waker,
                cancelled,
            }) => timers.push(TimerEntry {
                deadline,
                waker,
                cancelled,
            }),
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        fire_expired(&mut timers, Instant::now());
    }

    tracing::trace!(pending = timers.len(), "timer driver stopped");
}

/// Wakes every non-cancelled entry whose deadline is at or before `now`.
fn fire_expired(timers: &mut BinaryHeap<TimerEntry>, now: Instant) -> usize {
    let mut fired = 0;

    while timers.peek().is_some_and(|entry| entry.deadline <= now) {
        if let Some(entry) = timers.pop()
            && !entry.cancelled.load(atomic::Ordering::Acquire)
        {
            entry.waker.wake();
            fired += 1;
        }
    }

    fired
}
