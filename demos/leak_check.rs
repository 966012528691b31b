//! Example: Leak detection
//!
//! This example tracks background activities and asserts that they all
//! finish, first by hand and then with the failure captured.

use std::thread;
use std::time::Duration;

use testkit_poll::leak::{self, have_leaked};
use testkit_poll::prelude::*;

fn main() {
    println!("🧰 testkit-poll - Leak Detection Examples\n");

    example_no_leak();
    example_leak_detected();
    example_ignored_activity();

    println!("\n✅ All leak detection examples completed!");
}

/// Workers that finish in time are not leaks
fn example_no_leak() {
    println!("📌 Example 1: Everything finishes");

    let before = leak::activities();
    let worker = leak::spawn("indexer", || {
        thread::sleep(Duration::from_millis(20));
    })
    .unwrap();

    eventually_fn(leak::activities)
        .within(Duration::from_secs(1))
        .should_not(have_leaked(before));
    worker.join().unwrap();

    println!("   No tracked activity outlived the check\n");
}

/// A worker blocked on a channel is reported with its origin
fn example_leak_detected() {
    println!("📌 Example 2: A stuck worker");

    let before = leak::activities();
    let gate = Chan::unbuffered(Kind::Bool);
    let worker = {
        let gate = gate.clone();
        leak::spawn("stuck-worker", move || {
            let _ = gate.recv();
        })
        .unwrap()
    };

    let failures = intercept_failures(|| {
        eventually_fn(leak::activities)
            .within(Duration::from_millis(50))
            .should_not(have_leaked(before));
    });
    for failure in &failures {
        println!("   {}", failure.replace('\n', "\n   "));
    }

    gate.close().unwrap();
    worker.join().unwrap();
    println!();
}

/// Long-lived activities can be excluded by name
fn example_ignored_activity() {
    println!("📌 Example 3: Ignoring a known background task");

    let before = leak::activities();
    let stop = CancelToken::new();
    let daemon = {
        let stop = stop.clone();
        leak::spawn("metrics-flusher", move || {
            let _ = stop.wait_timeout(Duration::from_secs(5));
        })
        .unwrap()
    };

    expect(leak::activities()).should_not(have_leaked(before).ignoring("metrics-flusher"));
    println!("   \"metrics-flusher\" is allowed to keep running");

    stop.cancel();
    daemon.join().unwrap();
}
