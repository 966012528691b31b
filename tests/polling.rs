//! Integration tests for `eventually` and `consistently` on wall-clock time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use testkit_poll::poll::{FailReason, PollState};
use testkit_poll::prelude::*;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// A value produced after 30ms is observed by a poll with a finer interval.
#[test]
fn test_eventually_sees_late_value() {
    let c = Chan::unbuffered(Kind::Str);
    let producer = {
        let c = c.clone();
        thread::spawn(move || {
            thread::sleep(ms(30));
            c.send("ready").unwrap();
        })
    };

    eventually(&c)
        .within(Duration::from_secs(1))
        .polling_every(ms(5))
        .should(receive_matching(equal("ready")).within(ms(10)));
    producer.join().unwrap();
}

#[test]
fn test_eventually_counts_attempts() {
    let calls = AtomicUsize::new(0);
    let outcome = eventually_fn(|| calls.fetch_add(1, Ordering::SeqCst) + 1)
        .within(Duration::from_secs(1))
        .polling_every(ms(1))
        .poll(&be_numerically(Comparison::Ge, 3), Mode::Affirm);

    assert!(outcome.is_success());
    assert_eq!(outcome.stats().attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// The timeout message carries the last attempt's explanation.
#[test]
fn test_eventually_times_out() {
    let started = Instant::now();
    let outcome = eventually("foo")
        .within(ms(50))
        .polling_every(ms(10))
        .poll(&have_prefix("bar"), Mode::Affirm);

    assert_eq!(outcome.state(), PollState::Failed);
    assert!(matches!(
        outcome,
        PollOutcome::Failed {
            reason: FailReason::TimedOut(_),
            ..
        }
    ));
    assert!(started.elapsed() >= ms(50));

    let rendered = outcome.render();
    assert!(rendered.starts_with("Timed out after"));
    assert!(rendered.contains("to have prefix"));
    assert!(matches!(outcome.into_result(), Err(Error::Timeout(_))));
}

#[test]
fn test_not_ready_sources_are_retried() {
    let mut calls = 0;
    eventually_try(move || {
        calls += 1;
        if calls < 3 {
            Err(Error::not_ready("warming up"))
        } else {
            Ok("warm")
        }
    })
    .within(Duration::from_secs(1))
    .polling_every(ms(1))
    .should(equal("warm"));
}

/// Any other source error ends polling at once.
#[test]
fn test_source_errors_are_terminal() {
    let calls = AtomicUsize::new(0);
    let outcome = eventually_try(|| -> testkit_poll::Result<i32> {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::source("database unreachable"))
    })
    .within(Duration::from_secs(10))
    .poll(&equal(1), Mode::Affirm);

    assert_eq!(outcome.state(), PollState::Errored);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        outcome.error(),
        Some(&Error::source("database unreachable"))
    );
}

#[test]
fn test_must_pass_repeatedly() {
    let calls = AtomicUsize::new(0);
    // passes on 1, fails on 2, then passes from 3 on
    let outcome = eventually_fn(|| {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        n != 2
    })
    .within(Duration::from_secs(1))
    .polling_every(ms(1))
    .must_pass_repeatedly(3)
    .poll(&be_true(), Mode::Affirm);

    assert!(outcome.is_success());
    assert_eq!(outcome.stats().attempts, 5);
}

#[test]
fn test_consistently_holds_for_the_whole_window() {
    let started = Instant::now();
    let outcome = consistently(3)
        .within(ms(50))
        .polling_every(ms(10))
        .poll(&be_numerically(Comparison::Lt, 5), Mode::Affirm);

    assert!(outcome.is_success());
    assert!(started.elapsed() >= ms(50));
    assert!(outcome.stats().attempts >= 2);
}

/// The first violating attempt ends a consistently poll.
#[test]
fn test_consistently_detects_violation() {
    let calls = AtomicUsize::new(0);
    let failures = intercept_failures(|| {
        consistently_fn(|| calls.fetch_add(1, Ordering::SeqCst))
            .within(Duration::from_secs(1))
            .polling_every(ms(1))
            .should(be_numerically(Comparison::Lt, 3));
    });

    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("Failed after"));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

/// A not-ready source breaks a consistently poll.
#[test]
fn test_consistently_rejects_transient_errors() {
    let outcome = consistently_try(|| -> testkit_poll::Result<i32> {
        Err(Error::not_ready("flapping"))
    })
    .within(ms(100))
    .poll(&equal(1), Mode::Affirm);

    assert!(matches!(
        outcome,
        PollOutcome::Failed {
            reason: FailReason::ConsistentlyViolated,
            ..
        }
    ));
    assert!(outcome.render().contains("flapping"));
}

#[test]
fn test_invalid_policies_are_errors() {
    let zero_interval = eventually(1)
        .polling_every(Duration::ZERO)
        .poll(&equal(1), Mode::Affirm);
    assert!(matches!(zero_interval.error(), Some(Error::InvalidPolicy(_))));

    let repeated = consistently(1)
        .within(ms(10))
        .must_pass_repeatedly(2)
        .poll(&equal(1), Mode::Affirm);
    assert!(matches!(repeated.error(), Some(Error::InvalidPolicy(_))));

    let unbounded = eventually(1).without_timeout().poll(&equal(1), Mode::Affirm);
    assert!(matches!(unbounded.error(), Some(Error::InvalidPolicy(_))));
}

/// Cancellation interrupts a sleep long before the timeout.
#[test]
fn test_cancellation_stops_polling() {
    let token = CancelToken::new();
    let canceller = token.cancel_after(ms(30));

    let started = Instant::now();
    let outcome = eventually("foo")
        .within(Duration::from_secs(10))
        .polling_every(Duration::from_secs(1))
        .with_cancel(&token)
        .poll(&equal("bar"), Mode::Affirm);

    assert_eq!(outcome.state(), PollState::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(outcome.render().starts_with("Cancelled after"));
    assert!(matches!(outcome.into_result(), Err(Error::Cancelled(_))));
    canceller.join().unwrap();
}

/// A token may replace the timeout entirely.
#[test]
fn test_cancel_without_timeout() {
    let token = CancelToken::new();
    let canceller = token.cancel_after(ms(20));

    let failures = intercept_failures(|| {
        eventually(false)
            .without_timeout()
            .with_cancel(&token)
            .should(be_true());
    });

    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("Cancelled after"));
    canceller.join().unwrap();
}

/// Sources that take the token can wind down their own work.
#[test]
fn test_source_sees_cancellation() {
    let token = CancelToken::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let canceller = token.cancel_after(ms(20));

    let outcome = {
        let seen = Arc::clone(&seen);
        eventually_with_cancel(move |cancel: &CancelToken| {
            seen.fetch_add(1, Ordering::SeqCst);
            cancel.wait_timeout(ms(5))
        })
        .without_timeout()
        .polling_every(ms(1))
        .with_cancel(&token)
        .poll(&equal(false), Mode::Negate)
    };

    // the source returns true once cancelled, but that result is dropped
    assert_eq!(outcome.state(), PollState::Cancelled);
    assert!(seen.load(Ordering::SeqCst) >= 1);
    canceller.join().unwrap();
}

/// A receive window never outlives the poll's budget.
#[test]
fn test_receive_window_is_clamped_to_timeout() {
    let c = Chan::unbuffered(Kind::Str);
    let started = Instant::now();
    let failures = intercept_failures(|| {
        eventually(&c)
            .within(ms(50))
            .should(receive().within(Duration::from_secs(10)));
    });

    assert_eq!(failures.len(), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_annotation_prefixes_failure() {
    let failures = intercept_failures(|| {
        eventually(1)
            .within(ms(20))
            .annotate("counter never reached two")
            .should(equal(2));
    });

    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("counter never reached two\nTimed out after"));
}

#[test]
#[should_panic(expected = "Timed out after")]
fn test_failure_panics_by_default() {
    eventually(1).within(ms(20)).should(equal(2));
}

#[cfg(feature = "tokio")]
mod async_polling {
    use super::*;

    #[tokio::test]
    async fn test_should_async_sees_late_value() {
        let c = Chan::buffered(Kind::Int, 1);
        let producer = {
            let c = c.clone();
            tokio::spawn(async move {
                tokio::time::sleep(ms(30)).await;
                c.try_send(42).unwrap();
            })
        };

        let ok = eventually(&c)
            .within(Duration::from_secs(1))
            .polling_every(ms(5))
            .should_async(receive_matching(equal(42)))
            .await;
        assert!(ok);
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn test_async_cancellation() {
        let token = CancelToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ms(20)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let outcome = eventually(0)
            .within(Duration::from_secs(10))
            .polling_every(Duration::from_secs(1))
            .with_cancel(&token)
            .poll_async(&equal(1), Mode::Affirm)
            .await;

        assert_eq!(outcome.state(), PollState::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_consistently_async() {
        let ok = consistently("steady")
            .within(ms(30))
            .should_async(have_prefix("st"))
            .await;
        assert!(ok);
    }
}
