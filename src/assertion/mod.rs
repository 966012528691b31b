//! Assertion sessions.
//!
//! A session binds an actual value (or a function producing one) to a mode
//! and a matcher and reports the verdict:
//!
//! - [`expect`] - evaluate once
//! - [`eventually`] and friends - poll until the matcher is satisfied
//! - [`consistently`] and friends - poll and require it to stay satisfied
//!
//! Success is silent. A failure renders one explanation and hands it to the
//! fail handler, which panics unless failures are being intercepted with
//! [`intercept_failures`] or a handler was installed with
//! [`register_fail_handler`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//! use testkit_poll::matcher::{be_numerically, Comparison};
//! use testkit_poll::eventually_fn;
//!
//! let counter = AtomicUsize::new(0);
//! eventually_fn(|| counter.fetch_add(1, Ordering::SeqCst))
//!     .within(Duration::from_secs(1))
//!     .polling_every(Duration::from_millis(1))
//!     .should(be_numerically(Comparison::Ge, 3));
//! ```

mod failure;

use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock, TimeSource};
use crate::error::{Error, Result};
use crate::matcher::{Matcher, Verdict};
use crate::poll::{
    self, CancelToken, Mode, PollOutcome, PollStats, Poller, PollingPolicy, Source, Strategy,
};
use crate::value::Value;

pub use failure::{intercept_failures, register_fail_handler, reset_fail_handler};

#[track_caller]
fn report(annotation: Option<&str>, explanation: &str) {
    let message = match annotation {
        Some(annotation) => format!("{annotation}\n{explanation}"),
        None => explanation.to_string(),
    };
    failure::report(message);
}

/// One-shot assertion returned by [`expect`].
#[derive(Debug, Clone)]
pub struct Assertion {
    actual: Value,
    annotation: Option<String>,
}

/// Start a one-shot assertion about `actual`.
pub fn expect(actual: impl Into<Value>) -> Assertion {
    Assertion {
        actual: actual.into(),
        annotation: None,
    }
}

impl Assertion {
    /// Prefix the failure message with `annotation`.
    #[must_use]
    pub fn annotate(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    /// Evaluate once, returning the raw verdict for `mode`.
    pub fn verdict(&self, matcher: &dyn Matcher, mode: Mode) -> Verdict {
        match matcher.evaluate(&self.actual) {
            Ok(matched) if mode.desired(matched) => Verdict::Matched,
            Ok(_) => Verdict::Mismatched(mode.explain(matcher, &self.actual)),
            Err(err) => Verdict::Errored(err),
        }
    }

    #[track_caller]
    fn check(&self, matcher: &dyn Matcher, mode: Mode) -> bool {
        match self.verdict(matcher, mode) {
            Verdict::Matched => true,
            Verdict::Mismatched(explanation) => {
                report(self.annotation.as_deref(), &explanation);
                false
            }
            Verdict::Errored(err) => {
                let explanation = mode.explain(matcher, &self.actual);
                report(
                    self.annotation.as_deref(),
                    &format!("Error: {err}\n{explanation}"),
                );
                false
            }
        }
    }

    /// Assert that `matcher` matches.
    #[track_caller]
    pub fn should(&self, matcher: impl Matcher) -> bool {
        self.check(&matcher, Mode::Affirm)
    }

    /// Assert that `matcher` does not match.
    #[track_caller]
    pub fn should_not(&self, matcher: impl Matcher) -> bool {
        self.check(&matcher, Mode::Negate)
    }
}

/// A polled assertion returned by [`eventually`], [`consistently`] and their
/// function-based variants.
///
/// The builder methods adjust timing; `should`/`should_not` run the poll and
/// report the verdict.
pub struct PolledAssertion<'a> {
    source: Source<'a>,
    strategy: Strategy,
    policy: PollingPolicy,
    cancel: Option<CancelToken>,
    clock: Option<Arc<dyn Clock>>,
    time: Option<Arc<dyn TimeSource>>,
    annotation: Option<String>,
}

impl std::fmt::Debug for PolledAssertion<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolledAssertion")
            .field("source", &self.source)
            .field("strategy", &self.strategy)
            .field("policy", &self.policy)
            .field("cancel", &self.cancel)
            .field("clock", &self.clock)
            .field("annotation", &self.annotation)
            .finish_non_exhaustive()
    }
}

impl<'a> PolledAssertion<'a> {
    /// A polled assertion over `source` using the process-wide defaults.
    pub fn new(strategy: Strategy, source: Source<'a>) -> Self {
        Self {
            source,
            strategy,
            policy: PollingPolicy::defaults_for(strategy),
            cancel: None,
            clock: None,
            time: None,
            annotation: None,
        }
    }

    /// Set the timeout (`eventually`) or observation window (`consistently`).
    #[must_use]
    pub fn within(mut self, timeout: Duration) -> Self {
        self.policy.timeout = Some(timeout);
        self
    }

    /// Poll until the cancellation token fires, with no timeout.
    #[must_use]
    pub fn without_timeout(mut self) -> Self {
        self.policy.timeout = None;
        self
    }

    /// Set the delay between attempts.
    #[must_use]
    pub fn polling_every(mut self, interval: Duration) -> Self {
        self.policy.interval = interval;
        self
    }

    /// Stop polling when `cancel` fires.
    #[must_use]
    pub fn with_cancel(mut self, cancel: &CancelToken) -> Self {
        self.cancel = Some(cancel.clone());
        self
    }

    /// Require `count` consecutive successful attempts.
    #[must_use]
    pub fn must_pass_repeatedly(mut self, count: usize) -> Self {
        self.policy.must_pass_repeatedly = count;
        self
    }

    /// Sleep through `clock` in the blocking driver.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Sleep through `time` in the async driver.
    #[must_use]
    pub fn with_time_source(mut self, time: impl TimeSource + 'static) -> Self {
        self.time = Some(Arc::new(time));
        self
    }

    /// Prefix the failure message with `annotation`.
    #[must_use]
    pub fn annotate(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    fn validate(&self) -> Result<()> {
        self.policy.validate(self.strategy, self.cancel.is_some())
    }

    fn errored(error: Error) -> PollOutcome {
        PollOutcome::Errored {
            error,
            explanation: None,
            stats: PollStats::default(),
        }
    }

    /// Poll on the calling thread and return the raw outcome without
    /// reporting it.
    pub fn poll(mut self, matcher: &dyn Matcher, mode: Mode) -> PollOutcome {
        if let Err(err) = self.validate() {
            return Self::errored(err);
        }
        let poller = Poller::new(self.strategy, self.policy);
        let cancel = self.cancel.take().unwrap_or_default();
        match self.clock.take() {
            Some(clock) => {
                poll::run_blocking(poller, &mut self.source, matcher, mode, clock.as_ref(), &cancel)
            }
            None => poll::run_blocking(
                poller,
                &mut self.source,
                matcher,
                mode,
                &SystemClock::new(),
                &cancel,
            ),
        }
    }

    /// Poll from an async task and return the raw outcome without reporting
    /// it.
    pub async fn poll_async(mut self, matcher: &dyn Matcher, mode: Mode) -> PollOutcome {
        if let Err(err) = self.validate() {
            return Self::errored(err);
        }
        let time = match self.time.take().or_else(default_time_source) {
            Some(time) => time,
            None => {
                return Self::errored(Error::invalid_policy(
                    "no async time source; enable the `tokio` feature or call with_time_source",
                ))
            }
        };
        let poller = Poller::new(self.strategy, self.policy);
        let cancel = self.cancel.take().unwrap_or_default();
        poll::run_async(poller, &mut self.source, matcher, mode, time.as_ref(), &cancel).await
    }

    /// Assert that `matcher` eventually matches (or keeps matching).
    #[track_caller]
    pub fn should(self, matcher: impl Matcher) -> bool {
        let annotation = self.annotation.clone();
        let outcome = self.poll(&matcher, Mode::Affirm);
        finish(annotation.as_deref(), &outcome)
    }

    /// Assert that `matcher` eventually stops matching (or keeps not
    /// matching).
    #[track_caller]
    pub fn should_not(self, matcher: impl Matcher) -> bool {
        let annotation = self.annotation.clone();
        let outcome = self.poll(&matcher, Mode::Negate);
        finish(annotation.as_deref(), &outcome)
    }

    /// Async form of [`PolledAssertion::should`].
    pub async fn should_async(self, matcher: impl Matcher) -> bool {
        let annotation = self.annotation.clone();
        let outcome = self.poll_async(&matcher, Mode::Affirm).await;
        finish(annotation.as_deref(), &outcome)
    }

    /// Async form of [`PolledAssertion::should_not`].
    pub async fn should_not_async(self, matcher: impl Matcher) -> bool {
        let annotation = self.annotation.clone();
        let outcome = self.poll_async(&matcher, Mode::Negate).await;
        finish(annotation.as_deref(), &outcome)
    }
}

#[cfg(feature = "tokio")]
fn default_time_source() -> Option<Arc<dyn TimeSource>> {
    Some(Arc::new(crate::clock::TokioTime::new()))
}

#[cfg(not(feature = "tokio"))]
fn default_time_source() -> Option<Arc<dyn TimeSource>> {
    None
}

#[track_caller]
fn finish(annotation: Option<&str>, outcome: &PollOutcome) -> bool {
    if outcome.is_success() {
        return true;
    }
    report(annotation, &outcome.render());
    false
}

/// Poll a fixed value until the matcher is satisfied.
///
/// Useful with matchers that observe a shared resource, such as channels.
pub fn eventually(actual: impl Into<Value>) -> PolledAssertion<'static> {
    PolledAssertion::new(Strategy::Eventually, Source::fixed(actual))
}

/// Poll a function until the matcher is satisfied by what it returns.
pub fn eventually_fn<'a, F, V>(f: F) -> PolledAssertion<'a>
where
    F: FnMut() -> V + 'a,
    V: Into<Value>,
{
    PolledAssertion::new(Strategy::Eventually, Source::func(f))
}

/// Poll a fallible function. [`Error::NotReady`] is retried; other errors
/// end polling.
pub fn eventually_try<'a, F, V>(f: F) -> PolledAssertion<'a>
where
    F: FnMut() -> Result<V> + 'a,
    V: Into<Value>,
{
    PolledAssertion::new(Strategy::Eventually, Source::try_func(f))
}

/// Poll a function that receives the assertion's cancellation token.
pub fn eventually_with_cancel<'a, F, V>(f: F) -> PolledAssertion<'a>
where
    F: FnMut(&CancelToken) -> V + 'a,
    V: Into<Value>,
{
    PolledAssertion::new(Strategy::Eventually, Source::with_cancel(f))
}

/// Require a fixed value to keep satisfying the matcher.
pub fn consistently(actual: impl Into<Value>) -> PolledAssertion<'static> {
    PolledAssertion::new(Strategy::Consistently, Source::fixed(actual))
}

/// Require a function's result to keep satisfying the matcher.
pub fn consistently_fn<'a, F, V>(f: F) -> PolledAssertion<'a>
where
    F: FnMut() -> V + 'a,
    V: Into<Value>,
{
    PolledAssertion::new(Strategy::Consistently, Source::func(f))
}

/// Require a fallible function's result to keep satisfying the matcher.
pub fn consistently_try<'a, F, V>(f: F) -> PolledAssertion<'a>
where
    F: FnMut() -> Result<V> + 'a,
    V: Into<Value>,
{
    PolledAssertion::new(Strategy::Consistently, Source::try_func(f))
}

/// Require the result of a cancellation-aware function to keep satisfying
/// the matcher.
pub fn consistently_with_cancel<'a, F, V>(f: F) -> PolledAssertion<'a>
where
    F: FnMut(&CancelToken) -> V + 'a,
    V: Into<Value>,
{
    PolledAssertion::new(Strategy::Consistently, Source::with_cancel(f))
}
