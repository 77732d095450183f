use ferrule::{CompletionSource, Deferred, Error, UnitState, task};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn test_ready_units_are_terminal() {
    let completed = Deferred::completed(5);
    let faulted = Deferred::<i32>::faulted(Error::msg("bad input"));
    let cancelled = Deferred::<i32>::cancelled();

    assert_eq!(completed.state(), UnitState::Completed);
    assert_eq!(faulted.state(), UnitState::Faulted);
    assert_eq!(cancelled.state(), UnitState::Cancelled);

    assert!(matches!(completed.outcome(), Some(Ok(5))));
    assert!(matches!(cancelled.outcome(), Some(Err(Error::OperationCancelled))));
    assert_eq!(
        faulted.outcome().unwrap().as_ref().unwrap_err().to_string(),
        "bad input"
    );
}

#[test]
fn test_continuations_fire_once_in_registration_order() {
    let source = CompletionSource::new();
    let unit = source.deferred();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..5 {
        let order = order.clone();
        unit.on_complete(move |outcome| {
            assert!(matches!(outcome, Ok(10)));
            order.lock().unwrap().push(i);
        });
    }

    assert!(order.lock().unwrap().is_empty());

    let settler = thread::spawn(move || source.complete(10));
    settler.join().unwrap().unwrap();

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_late_continuation_runs_immediately() {
    let unit = Deferred::completed("done");
    let seen = Arc::new(Mutex::new(None));

    let slot = seen.clone();
    unit.on_complete(move |outcome| {
        *slot.lock().unwrap() = outcome.as_ref().ok().copied();
    });

    assert_eq!(*seen.lock().unwrap(), Some("done"));
}

#[test]
fn test_panicking_continuation_does_not_starve_others() {
    let source = CompletionSource::new();
    let unit = source.deferred();
    let ran = Arc::new(Mutex::new(false));

    unit.on_complete(|_| panic!("continuation failed"));

    let flag = ran.clone();
    unit.on_complete(move |_| *flag.lock().unwrap() = true);

    source.complete(()).unwrap();

    assert!(*ran.lock().unwrap());
    assert_eq!(unit.state(), UnitState::Completed);
}

#[test]
fn test_then_maps_and_captures_panics() {
    let unit = Deferred::completed(21);

    let doubled = unit.then(|outcome| outcome.clone().map(|v| v * 2));
    assert!(matches!(doubled.outcome(), Some(Ok(42))));

    let broken = unit.then::<i32, _>(|_| panic!("mapper failed"));
    assert!(matches!(
        broken.outcome(),
        Some(Err(Error::Panicked(message))) if message == "mapper failed"
    ));
}

#[test]
fn test_then_propagates_faults() {
    let unit = Deferred::<i32>::faulted(Error::TimedOut);
    let mapped = unit.then(|outcome| outcome.clone().map(|v| v + 1));

    assert_eq!(mapped.state(), UnitState::Faulted);
    assert!(matches!(mapped.outcome(), Some(Err(Error::TimedOut))));
}

#[test]
fn test_wait_blocking_from_another_thread() {
    let source = CompletionSource::new();
    let unit = source.deferred();

    thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        source.complete(vec![1, 2, 3]).unwrap();
    });

    assert_eq!(unit.wait_blocking().unwrap(), vec![1, 2, 3]);
}

#[ferrule::test]
async fn test_awaiting_twice_yields_the_same_outcome() {
    let unit = task::submit(async { Ok(String::from("value")) });

    let first = unit.clone().await.unwrap();
    let second = unit.await.unwrap();

    assert_eq!(first, "value");
    assert_eq!(first, second);
}

#[ferrule::test]
async fn test_unit_states_follow_the_work() {
    let faulted = task::submit::<_, ()>(async { Err(Error::msg("nope")) });
    let cancelled = task::submit::<_, ()>(async { Err(Error::OperationCancelled) });

    assert!(faulted.clone().await.is_err());
    assert!(cancelled.clone().await.is_err());

    assert_eq!(faulted.state(), UnitState::Faulted);
    assert_eq!(cancelled.state(), UnitState::Cancelled);
    assert_ne!(faulted.id(), cancelled.id());
}
