//! Example: Polling channels
//!
//! This example shows `eventually` and `consistently` waiting on channels
//! fed by other threads, and what a failure looks like.

use std::thread;
use std::time::{Duration, Instant};

use testkit_poll::prelude::*;

fn main() {
    println!("🧰 testkit-poll - Channel Polling Examples\n");

    example_receive_late_value();
    example_hand_off();
    example_closed_channel();
    example_nothing_arrives();

    println!("\n✅ All channel examples completed!");
}

/// Wait for a value produced by another thread
fn example_receive_late_value() {
    println!("📌 Example 1: Receiving a late value");

    let c = Chan::unbuffered(Kind::Str);
    let producer = {
        let c = c.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            c.send("ready").unwrap();
        })
    };

    let started = Instant::now();
    eventually(&c)
        .within(Duration::from_secs(1))
        .should(receive_matching(equal("ready")).within(Duration::from_millis(10)));
    producer.join().unwrap();

    println!("   Received \"ready\" after {:?}\n", started.elapsed());
}

/// Keep offering a value until a receiver takes it
fn example_hand_off() {
    println!("📌 Example 2: Handing a value to a slow receiver");

    let c = Chan::unbuffered(Kind::Int);
    let consumer = {
        let c = c.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            c.recv().unwrap()
        })
    };

    eventually(&c).within(Duration::from_secs(1)).should(be_sent(7));
    println!("   Consumer got {}\n", consumer.join().unwrap());
}

/// A closed channel ends polling immediately
fn example_closed_channel() {
    println!("📌 Example 3: Closed channels short-circuit");

    let c = Chan::unbuffered(Kind::Str);
    c.close().unwrap();

    let started = Instant::now();
    let failures = intercept_failures(|| {
        eventually(&c)
            .within(Duration::from_secs(10))
            .should(be_sent("foo"));
    });

    println!(
        "   Gave up after {:?} instead of 10s:\n   {}\n",
        started.elapsed(),
        failures.join("\n   ")
    );
}

/// Nothing should show up during the window
fn example_nothing_arrives() {
    println!("📌 Example 4: Consistently empty");

    let c = Chan::buffered(Kind::Int, 4);
    consistently(&c)
        .within(Duration::from_millis(50))
        .should_not(receive());

    println!("   The channel stayed empty for 50ms");
}
