use ferrule::parallel::{LoopOptions, for_each_bounded, for_each_bounded_with};
use ferrule::time::sleep;
use ferrule::{CancellationSignal, Error, UnitState};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[ferrule::test]
async fn test_processes_every_item() {
    init_tracing();

    let seen = Arc::new(Mutex::new(BTreeSet::new()));
    let record = seen.clone();

    let result = for_each_bounded(0..25, 4, move |item, state| {
        let record = record.clone();
        async move {
            assert_eq!(item, state.index());
            record.lock().unwrap().insert(item);
            Ok(())
        }
    })
    .await
    .unwrap();

    assert!(result.completed);
    assert!(!result.broken);
    assert_eq!(result.lowest_stop_index, None);
    assert_eq!(result.processed, 25);
    assert_eq!(*seen.lock().unwrap(), (0..25).collect());
}

#[ferrule::test(worker_threads = 4)]
async fn test_never_exceeds_max_concurrency() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let (counter, high) = (in_flight.clone(), peak.clone());

    let result = for_each_bounded(0..10, 2, move |_, _| {
        let counter = counter.clone();
        let high = high.clone();
        async move {
            let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
            high.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(5)).await;
            counter.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    })
    .await
    .unwrap();

    assert_eq!(result.processed, 10);
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[ferrule::test]
async fn test_stop_runs_everything_up_to_the_stop_index() {
    let seen = Arc::new(Mutex::new(BTreeSet::new()));
    let exits = Arc::new(Mutex::new(Vec::new()));

    let (record, exit_log) = (seen.clone(), exits.clone());

    let result = for_each_bounded(0..100, 3, move |item: usize, state| {
        let record = record.clone();
        let exit_log = exit_log.clone();
        async move {
            if item == 7 {
                state.request_stop();
            }
            sleep(Duration::from_millis(2)).await;
            exit_log.lock().unwrap().push((item, state.should_exit()));
            record.lock().unwrap().insert(item);
            Ok(())
        }
    })
    .await
    .unwrap();

    assert!(!result.completed);
    assert!(!result.broken);
    assert_eq!(result.lowest_stop_index, Some(7));

    let seen = seen.lock().unwrap();
    for item in 0..=7 {
        assert!(seen.contains(&item), "item {item} should have run");
    }
    assert!(seen.len() < 100);

    for (item, should_exit) in exits.lock().unwrap().iter() {
        assert_eq!(*should_exit, *item > 7, "should_exit for item {item}");
    }
}

#[ferrule::test]
async fn test_break_stops_admission_and_flags_every_body() {
    let started = Arc::new(Mutex::new(BTreeSet::new()));
    let flagged = Arc::new(Mutex::new(BTreeSet::new()));
    let broken = Arc::new(AtomicBool::new(false));

    let (record, flags, gate) = (started.clone(), flagged.clone(), broken.clone());

    // Item 0 finishes at once and item 1 holds its lane until the break,
    // so both lanes are busy (with 1 and 2) when item 2 breaks.
    let result = for_each_bounded(0..100, 2, move |item: usize, state| {
        let record = record.clone();
        let flags = flags.clone();
        let gate = gate.clone();
        async move {
            record.lock().unwrap().insert(item);

            match item {
                1 => {
                    while !gate.load(Ordering::SeqCst) {
                        sleep(Duration::from_millis(1)).await;
                    }
                }
                2 => {
                    state.request_break();
                    gate.store(true, Ordering::SeqCst);
                }
                _ => {}
            }

            if state.should_exit() {
                flags.lock().unwrap().insert(item);
            }
            Ok(())
        }
    })
    .await
    .unwrap();

    assert!(result.broken);
    assert!(!result.completed);
    assert_eq!(result.processed, 3);

    assert_eq!(*started.lock().unwrap(), BTreeSet::from([0, 1, 2]));
    assert_eq!(*flagged.lock().unwrap(), BTreeSet::from([1, 2]));
}

#[ferrule::test]
async fn test_body_errors_are_aggregated_in_item_order() {
    let started = Arc::new(AtomicUsize::new(0));
    let counter = started.clone();

    let outcome = for_each_bounded(0..10, 10, move |item: usize, _| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);

            if item == 5 || item == 2 {
                while counter.load(Ordering::SeqCst) < 10 {
                    sleep(Duration::from_millis(1)).await;
                }
                return Err(Error::msg(format!("item {item}")));
            }

            Ok(())
        }
    })
    .await;

    let Err(Error::Aggregate(faults)) = outcome else {
        panic!("expected an aggregate fault, got {outcome:?}");
    };
    let messages: Vec<_> = faults.iter().map(ToString::to_string).collect();
    assert_eq!(messages, vec!["item 2", "item 5"]);
}

#[ferrule::test]
async fn test_panicking_body_faults_the_loop() {
    let outcome = for_each_bounded(0..4, 2, |item: usize, _| async move {
        if item == 1 {
            panic!("body {item} exploded");
        }
        Ok(())
    })
    .await;

    let Err(Error::Aggregate(faults)) = outcome else {
        panic!("expected an aggregate fault, got {outcome:?}");
    };
    assert!(matches!(
        faults.as_slice(),
        [Error::Panicked(message)] if message == "body 1 exploded"
    ));
}

#[ferrule::test]
async fn test_synchronous_body_panic_stops_admission() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let outcome = for_each_bounded(0..50, 2, move |item: usize, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        if item == 1 {
            panic!("setup for {item} failed");
        }
        async move {
            sleep(Duration::from_millis(2)).await;
            Ok(())
        }
    })
    .await;

    let Err(Error::Aggregate(faults)) = outcome else {
        panic!("expected an aggregate fault, got {outcome:?}");
    };
    assert!(matches!(
        faults.as_slice(),
        [Error::Panicked(message)] if message == "setup for 1 failed"
    ));
    assert!(calls.load(Ordering::SeqCst) <= 3);
}

#[ferrule::test]
async fn test_cancelled_body_cancels_the_loop() {
    let unit = for_each_bounded(0..10, 1, |item: usize, _| async move {
        if item == 3 {
            return Err(Error::OperationCancelled);
        }
        Ok(())
    });

    assert!(matches!(unit.clone().await, Err(Error::OperationCancelled)));
    assert_eq!(unit.state(), UnitState::Cancelled);
}

#[ferrule::test]
async fn test_signal_stops_admission() {
    let signal = CancellationSignal::new();
    let processed = Arc::new(AtomicUsize::new(0));

    let (trigger, counter) = (signal.clone(), processed.clone());

    let options = LoopOptions::new(1).signal(&signal);
    let outcome = for_each_bounded_with(0..50, options, move |item: usize, state| {
        let trigger = trigger.clone();
        let counter = counter.clone();
        async move {
            if item == 1 {
                trigger.set();
                assert!(state.should_exit());
                assert!(state.signal().is_some_and(CancellationSignal::is_set));
            }
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
    .await;

    assert!(matches!(outcome, Err(Error::OperationCancelled)));
    assert!(processed.load(Ordering::SeqCst) <= 2);
}

#[ferrule::test]
async fn test_signal_set_during_the_last_item_still_completes() {
    let signal = CancellationSignal::new();
    let processed = Arc::new(AtomicUsize::new(0));

    let (trigger, counter) = (signal.clone(), processed.clone());

    let options = LoopOptions::new(1).signal(&signal);
    let result = for_each_bounded_with(0..3, options, move |item: usize, _| {
        let trigger = trigger.clone();
        let counter = counter.clone();
        async move {
            if item == 2 {
                trigger.set();
            }
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
    .await
    .unwrap();

    assert_eq!(result.processed, 3);
    assert!(result.completed);
    assert_eq!(processed.load(Ordering::SeqCst), 3);
}

#[ferrule::test]
async fn test_empty_input_completes() {
    let result = for_each_bounded(Vec::<u8>::new(), 3, |_, _| async { Ok(()) })
        .await
        .unwrap();

    assert!(result.completed);
    assert_eq!(result.processed, 0);
}

#[test]
#[should_panic(expected = "max_concurrency must be > 0")]
fn test_zero_concurrency_panics() {
    let _ = LoopOptions::new(0);
}
