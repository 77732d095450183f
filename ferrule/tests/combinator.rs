use ferrule::time::sleep;
use ferrule::{CompletionSource, Deferred, Error, UnitState, task, when_all, when_any};
use std::time::Duration;

#[ferrule::test]
async fn test_when_all_keeps_input_order() {
    let units: Vec<_> = [30u64, 10, 20]
        .into_iter()
        .map(|delay| {
            task::spawn(async move {
                sleep(Duration::from_millis(delay)).await;
                delay
            })
        })
        .collect();

    assert_eq!(when_all(units).await.unwrap(), vec![30, 10, 20]);
}

#[test]
fn test_when_all_of_nothing_completes_empty() {
    let all = when_all(Vec::<Deferred<u8>>::new());

    assert_eq!(all.state(), UnitState::Completed);
    assert!(matches!(all.outcome(), Some(Ok(values)) if values.is_empty()));
}

#[test]
fn test_when_all_collects_every_fault_in_input_order() {
    let sources: Vec<CompletionSource<u32>> = (0..4).map(|_| CompletionSource::new()).collect();
    let all = when_all(sources.iter().map(CompletionSource::deferred));

    sources[3].fail(Error::msg("third")).unwrap();
    sources[0].complete(1).unwrap();
    sources[2].cancel().unwrap();
    assert_eq!(all.state(), UnitState::Pending);

    sources[1].fail(Error::msg("first")).unwrap();

    let Some(Err(Error::Aggregate(faults))) = all.outcome() else {
        panic!("expected an aggregate fault, got {:?}", all.outcome());
    };
    let messages: Vec<_> = faults.iter().map(ToString::to_string).collect();
    assert_eq!(messages, vec!["first", "third"]);
}

#[test]
fn test_when_all_cancelled_without_faults() {
    let all = when_all([Deferred::completed(1), Deferred::cancelled(), Deferred::completed(3)]);

    assert_eq!(all.state(), UnitState::Cancelled);
}

#[ferrule::test]
async fn test_when_any_returns_the_first_finisher() {
    let slow = task::spawn(async {
        sleep(Duration::from_millis(200)).await;
        "slow"
    });
    let fast = task::spawn(async {
        sleep(Duration::from_millis(5)).await;
        "fast"
    });

    let winner = when_any([slow.clone(), fast.clone()]).await.unwrap();

    assert_eq!(winner.id(), fast.id());
    assert_eq!(winner.await.unwrap(), "fast");
    assert!(!slow.is_terminal());
}

#[test]
fn test_when_any_counts_a_fault_as_finishing() {
    let pending = CompletionSource::<i32>::new();
    let failing = CompletionSource::<i32>::new();

    let any = when_any([pending.deferred(), failing.deferred()]);
    failing.fail(Error::msg("lost")).unwrap();

    let Some(Ok(winner)) = any.outcome() else {
        panic!("when_any should complete with the faulted unit");
    };
    assert_eq!(winner.id(), failing.deferred().id());
    assert_eq!(winner.state(), UnitState::Faulted);

    pending.complete(1).unwrap();
    assert_eq!(any.outcome().unwrap().as_ref().unwrap().id(), failing.deferred().id());
}

#[test]
fn test_when_any_of_nothing_faults() {
    let any = when_any(Vec::<Deferred<()>>::new());

    assert!(matches!(any.outcome(), Some(Err(Error::EmptyInput))));
}
