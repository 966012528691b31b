//! Example: Virtual time
//!
//! This example drives polls with `MockClock`, so a one-minute timeout
//! finishes instantly while following the exact same schedule.

use std::time::{Duration, Instant};

use testkit_poll::clock::MockClock;
use testkit_poll::prelude::*;

fn main() {
    println!("🧰 testkit-poll - Virtual Time Examples\n");

    example_instant_timeout();
    example_scheduled_cancel();
    example_async_on_virtual_time();

    println!("\n✅ All virtual time examples completed!");
}

/// A long timeout elapses without real waiting
fn example_instant_timeout() {
    println!("📌 Example 1: A one-minute timeout in no time");

    let clock = MockClock::new();
    let started = Instant::now();
    let outcome = eventually(1)
        .within(Duration::from_secs(60))
        .polling_every(Duration::from_secs(5))
        .with_clock(clock.clone())
        .poll(&equal(2), Mode::Affirm);

    println!("   Virtual time: {:?}", clock.now());
    println!("   Real time:    {:?}", started.elapsed());
    println!("   Attempts:     {}", outcome.stats().attempts);
    println!("   {}\n", outcome.render().replace('\n', "\n   "));
}

/// Cancellation fires at a virtual deadline
fn example_scheduled_cancel() {
    println!("📌 Example 2: Cancelling at a virtual deadline");

    let clock = MockClock::new();
    let token = CancelToken::new();
    clock.cancel_at(Duration::from_millis(35), &token);

    let outcome = eventually("pending")
        .without_timeout()
        .with_cancel(&token)
        .with_clock(clock.clone())
        .poll(&equal("done"), Mode::Affirm);

    println!("   State: {:?} at {:?}", outcome.state(), clock.now());
    println!("   Sleeps: {:?}\n", clock.sleeps());
}

/// Async polls accept the same clock as their time source
fn example_async_on_virtual_time() {
    println!("📌 Example 3: Async polling on virtual time");

    let clock = MockClock::new();
    let ok = futures::executor::block_on(
        consistently("steady")
            .within(Duration::from_secs(30))
            .with_time_source(clock.clone())
            .should_async(have_prefix("st")),
    );

    println!("   Held for {:?} of virtual time: {ok}", clock.now());
}
