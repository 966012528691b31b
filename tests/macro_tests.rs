//! Integration tests for the `#[testkit_poll::test]` macro.

#![cfg(feature = "macros")]
// MockClock is used in function signatures but injected by the macro
#![allow(unused_imports)]

use std::time::Duration;
use testkit_poll::clock::MockClock;
use testkit_poll::prelude::*;

/// Basic sync test without clock injection.
#[testkit_poll::test]
fn test_basic_sync() {
    expect(2 + 2).should(equal(4));
}

/// Basic async test without clock injection.
#[testkit_poll::test]
async fn test_basic_async() {
    tokio::task::yield_now().await;
    expect(2 + 2).should(equal(4));
}

/// Test with MockClock injection.
#[testkit_poll::test]
fn test_with_clock(clock: MockClock) {
    assert_eq!(clock.now(), Duration::ZERO);

    clock.advance(Duration::from_secs(10));
    assert_eq!(clock.now(), Duration::from_secs(10));
}

/// Test with custom start time.
#[testkit_poll::test(start_time = 1000)]
fn test_start_time(clock: MockClock) {
    assert_eq!(clock.now(), Duration::from_secs(1000));
}

/// A poll on the injected clock finishes without real waiting.
#[testkit_poll::test]
fn test_poll_on_injected_clock(clock: MockClock) {
    let outcome = eventually(1)
        .within(Duration::from_secs(60))
        .polling_every(Duration::from_secs(1))
        .with_clock(clock.clone())
        .poll(&equal(2), Mode::Affirm);

    assert_eq!(outcome.state(), PollState::Failed);
    assert_eq!(clock.now(), Duration::from_secs(60));
    assert_eq!(outcome.stats().attempts, 61);
}

/// Async tests receive the clock as well, and drive async polls with it.
#[testkit_poll::test(start_time = 5)]
async fn test_async_with_clock(clock: MockClock) {
    let ok = consistently("steady")
        .within(Duration::from_secs(30))
        .polling_every(Duration::from_secs(1))
        .with_time_source(clock.clone())
        .should_async(equal("steady"))
        .await;

    assert!(ok);
    assert_eq!(clock.now(), Duration::from_secs(35));
}

/// Test that returns Result.
#[testkit_poll::test]
fn test_result_return() -> Result<()> {
    let c = Chan::buffered(Kind::Int, 1);
    c.try_send(1).map_err(|err| Error::source(err.to_string()))?;
    expect(&c).should(receive_matching(equal(1)));
    Ok(())
}

/// Async test that returns Result.
#[testkit_poll::test]
async fn test_async_result_return() -> Result<()> {
    tokio::task::yield_now().await;
    eventually(1)
        .within(Duration::from_millis(50))
        .poll_async(&equal(1), Mode::Affirm)
        .await
        .into_result()?;
    Ok(())
}

/// Tracked activities that finish inside the body pass the leak check.
#[testkit_poll::test(leak_check = true)]
fn test_leak_check_sync() {
    let worker = testkit_poll::leak::spawn("sync-worker", || 40 + 2).unwrap();
    assert_eq!(worker.join().unwrap(), 42);
}

/// Activities may still be winding down when the body returns; the check
/// waits for them.
#[testkit_poll::test(leak_check = true, leak_timeout_ms = 2000)]
fn test_leak_check_waits_for_stragglers() {
    let _detached = testkit_poll::leak::spawn("straggler", || {
        std::thread::sleep(Duration::from_millis(50));
    })
    .unwrap();
}

#[testkit_poll::test(leak_check = true)]
async fn test_leak_check_async() {
    let worker = testkit_poll::leak::spawn("async-worker", || ()).unwrap();
    tokio::task::spawn_blocking(move || worker.join().unwrap())
        .await
        .unwrap();
}

/// Multi-threaded flavor runs spawned tasks on worker threads.
#[testkit_poll::test(flavor = "multi_thread")]
async fn test_multi_thread_flavor() {
    let c = Chan::buffered(Kind::Str, 1);
    let producer = {
        let c = c.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            c.try_send("done").unwrap();
        })
    };

    let ok = eventually(&c)
        .within(Duration::from_secs(1))
        .should_async(receive_matching(equal("done")))
        .await;
    assert!(ok);
    producer.await.unwrap();
}

/// Panics still fail the test through the macro wrapper.
#[testkit_poll::test]
#[should_panic(expected = "Timed out after")]
fn test_failure_panics_through_wrapper(clock: MockClock) {
    eventually(1)
        .within(Duration::from_secs(1))
        .with_clock(clock)
        .should(equal(2));
}
