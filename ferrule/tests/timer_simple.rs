use ferrule::time::sleep;
use std::time::{Duration, Instant};

#[ferrule::test]
async fn test_sleep_basic() {
    let start = Instant::now();
    sleep(Duration::from_millis(50)).await;

    assert!(
        start.elapsed() >= Duration::from_millis(50),
        "sleep should wait at least the specified duration"
    );
}

#[ferrule::test]
async fn test_sleep_zero_duration() {
    let start = Instant::now();
    sleep(Duration::ZERO).await;

    assert!(
        start.elapsed() < Duration::from_millis(10),
        "zero duration sleep should be fast"
    );
}

#[ferrule::test(worker_threads = 1)]
async fn test_sleep_does_not_block_the_worker() {
    let start = Instant::now();

    let slow = ferrule::task::spawn(sleep(Duration::from_millis(200)));
    let fast = ferrule::task::spawn(async { 1 });

    assert_eq!(fast.await.unwrap(), 1);
    assert!(start.elapsed() < Duration::from_millis(200));

    slow.await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(200));
}
