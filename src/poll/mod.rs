//! The polling engine.
//!
//! Polling turns any [`Matcher`](crate::matcher::Matcher) plus a [`Source`]
//! into an assertion that either becomes true ([`Strategy::Eventually`]) or
//! stays true ([`Strategy::Consistently`]):
//!
//! - the first attempt happens immediately, later ones every `interval`
//! - the total wall-clock bound is the timeout, so slow attempts eat into it
//! - errors end polling at once, except [`Error::NotReady`](crate::Error::NotReady)
//!   from a source, which is retried
//! - a matcher reporting that its verdict can no longer change ends polling
//!   early
//! - a fired [`CancelToken`] ends polling before the next attempt and wakes
//!   any sleep in progress
//!
//! The rules live in [`Poller`]; the assertion session drives it either on
//! the calling thread or from an async task.

mod cancel;
mod driver;
mod engine;
mod policy;
mod source;

pub use cancel::{CancelToken, Cancelled};
pub use engine::{
    FailReason, Mode, Observation, PollOutcome, PollState, PollStats, Poller, Step, Strategy,
};
pub use policy::PollingPolicy;
pub use source::Source;

pub(crate) use driver::{run_async, run_blocking};
