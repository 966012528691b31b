//! # testkit-poll 🧰
//!
//! > Polling assertions, matchers, and channel probes for Rust tests
//!
//! **testkit-poll** lets a test say what should *become* true, or *stay*
//! true, about values that change concurrently, and get one readable
//! explanation when it does not.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use testkit_poll::prelude::*;
//!
//! let c = Chan::unbuffered(Kind::Str);
//! let producer = {
//!     let c = c.clone();
//!     std::thread::spawn(move || {
//!         std::thread::sleep(Duration::from_millis(30));
//!         c.send("ready").unwrap();
//!     })
//! };
//!
//! eventually(&c)
//!     .within(Duration::from_secs(1))
//!     .should(receive_matching(equal("ready")).within(Duration::from_millis(10)));
//! producer.join().unwrap();
//! ```
//!
//! ## Features
//!
//! - 🔁 **Polling Engine** - `eventually` / `consistently` with timeouts,
//!   intervals and cancellation
//! - 🎯 **Matchers** - one protocol for values, errors, containers and channels
//! - 📡 **Channel Probes** - send, receive and close detection that never
//!   outlives the poll budget
//! - ⏱️ **Virtual Time** - drive polls with `MockClock` and finish instantly
//! - 🔍 **Leak Detection** - assert that spawned activities have finished

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Time sources for the polling engine
pub mod clock;

pub mod assertion;
pub mod chan;
pub mod config;
pub mod error;
pub mod leak;
pub mod matcher;
pub mod poll;
pub mod value;

/// Prelude for convenient imports
///
/// ```rust
/// use testkit_poll::prelude::*;
/// ```
pub mod prelude {
    pub use crate::assertion::{
        consistently, consistently_fn, consistently_try, consistently_with_cancel, eventually,
        eventually_fn, eventually_try, eventually_with_cancel, expect, intercept_failures,
    };
    pub use crate::chan::{Chan, ChanHandle, ElemType};
    pub use crate::clock::{MockClock, SystemClock};
    pub use crate::error::{Error, Result};
    pub use crate::matcher::*;
    pub use crate::poll::{CancelToken, Mode, PollOutcome, PollState};
    pub use crate::value::{ErrorValue, Kind, Value};
}

// Re-exports
pub use assertion::{
    consistently, consistently_fn, consistently_try, consistently_with_cancel, eventually,
    eventually_fn, eventually_try, eventually_with_cancel, expect, intercept_failures,
    register_fail_handler, reset_fail_handler, Assertion, PolledAssertion,
};
pub use error::{Error, Result};

// Re-export the test macro when macros feature is enabled
#[cfg(feature = "macros")]
pub use testkit_poll_macros::test;
