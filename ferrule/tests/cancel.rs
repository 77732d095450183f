use ferrule::{CancellationSignal, Error, RuntimeBuilder, UnitState, task};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

#[test]
fn test_linked_signal_follows_any_parent() {
    let first = CancellationSignal::new();
    let second = CancellationSignal::new();
    let child = CancellationSignal::linked(&[&first, &second]);

    assert!(!child.is_set());

    second.set();

    assert!(child.is_set());
    assert!(!first.is_set());
}

#[test]
fn test_setting_a_linked_child_leaves_parents_alone() {
    let parent = CancellationSignal::new();
    let child = CancellationSignal::linked(&[&parent]);

    child.set();

    assert!(!parent.is_set());
    assert!(matches!(child.check(), Err(Error::OperationCancelled)));
    assert!(parent.check().is_ok());
}

#[test]
fn test_signal_set_before_submission_skips_the_work() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();

    let signal = CancellationSignal::new();
    signal.set();

    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();

    let unit = rt.submit(
        async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        },
        Some(&signal),
    );

    assert_eq!(unit.state(), UnitState::Cancelled);
    assert!(matches!(unit.wait_blocking(), Err(Error::OperationCancelled)));

    drop(rt);
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn test_signal_set_while_queued_skips_the_work() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();

    let signal = CancellationSignal::new();
    let (release, gate) = mpsc::channel::<()>();
    let (started_tx, started) = mpsc::channel::<()>();

    let blocker = rt.submit(
        async move {
            let _ = started_tx.send(());
            let _ = gate.recv();
            Ok(())
        },
        None,
    );
    started.recv().unwrap();

    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    let queued = rt.submit(
        async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        },
        Some(&signal),
    );

    signal.set();
    release.send(()).unwrap();

    blocker.wait_blocking().unwrap();
    assert!(matches!(queued.wait_blocking(), Err(Error::OperationCancelled)));
    assert!(!ran.load(Ordering::SeqCst));
}

#[ferrule::test]
async fn test_running_work_observes_the_signal() {
    let signal = CancellationSignal::new();
    let iterations = Arc::new(AtomicUsize::new(0));

    let unit = {
        let observed = signal.clone();
        let iterations = iterations.clone();

        task::submit_cancellable::<_, ()>(
            async move {
                loop {
                    observed.check()?;
                    iterations.fetch_add(1, Ordering::SeqCst);
                    ferrule::yield_now().await;
                }
            },
            &signal,
        )
    };

    while iterations.load(Ordering::SeqCst) == 0 {
        ferrule::yield_now().await;
    }
    signal.set();

    let outcome = unit.clone().await;
    assert!(matches!(outcome, Err(Error::OperationCancelled)));
    assert_eq!(unit.state(), UnitState::Cancelled);
}

#[ferrule::test]
async fn test_set_after_wakes_the_cancelled_future() {
    let signal = CancellationSignal::new();
    signal.set_after(Duration::from_millis(20));

    signal.cancelled().await;

    assert!(signal.is_set());
}

#[test]
fn test_callbacks_run_on_the_setting_thread() {
    let signal = CancellationSignal::new();
    let observed = Arc::new(std::sync::Mutex::new(None));

    let slot = observed.clone();
    let _ = signal.on_set(move || {
        *slot.lock().unwrap() = thread::current().name().map(str::to_owned);
    });

    let setter = signal.clone();
    thread::Builder::new()
        .name("setter".into())
        .spawn(move || setter.set())
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(observed.lock().unwrap().as_deref(), Some("setter"));
}
