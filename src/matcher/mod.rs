// Allow must_use_candidate for matcher factory functions since returning the matcher
// without using it is the common pattern for test setup
#![allow(clippy::must_use_candidate)]

//! The matcher protocol and the built-in matchers.
//!
//! Every matcher implements [`Matcher`]. Evaluation returns `Ok(true)` for a
//! match, `Ok(false)` for a mismatch and `Err(_)` when the assertion makes no
//! sense for the actual value (wrong kind, closed channel, bad expectation).
//! The polling engine retries mismatches and stops on errors.
//!
//! - Equality: [`equal`], [`be_nil`], [`be_true`], [`be_false`], [`ignore`],
//!   [`satisfy`], [`be_numerically`]
//! - Containers: [`be_empty`], [`have_len`]
//! - Strings: [`contain_substring`], [`have_prefix`], [`match_regexp`]
//! - Errors: [`match_error`], [`match_error_with`], [`have_occurred`],
//!   [`succeed`]
//! - Channels: [`be_closed`], [`be_sent`], [`receive`], [`receive_matching`]
//! - Decorators: [`point_to`], [`not`], [`and`], [`or`]
//!
//! # Example
//!
//! ```rust
//! use testkit_poll::matcher::{and, be_empty, have_len, not, Matcher};
//! use testkit_poll::value::Value;
//!
//! let m = and(vec![Box::new(not(be_empty())), Box::new(have_len(3))]);
//! assert!(m.evaluate(&Value::from("foo")).unwrap());
//!
//! // Asking a number whether it is empty is an error, not a mismatch
//! assert!(be_empty().evaluate(&Value::from(0)).is_err());
//! ```

mod channel;
mod collection;
mod combinator;
mod equality;
mod errors;
mod pointer;
mod string;

use std::time::Duration;

use crate::error::{Error, Result};
use crate::poll::CancelToken;
use crate::value::Value;

pub use channel::{be_closed, be_sent, receive, receive_matching, BeClosed, BeSent, Receive};
pub use collection::{be_empty, have_len, BeEmpty, HaveLen};
pub use combinator::{and, not, or, And, Not, Or};
pub use equality::{
    be_false, be_nil, be_numerically, be_true, equal, ignore, satisfy, BeBool, BeNil,
    BeNumerically, Comparison, Equal, Ignore, Satisfy,
};
pub use errors::{
    have_occurred, match_error, match_error_with, succeed, HaveOccurred, MatchError, Succeed,
};
pub use pointer::{point_to, PointTo};
pub use string::{contain_substring, have_prefix, match_regexp, ContainSubstring, HavePrefix, MatchRegexp};

/// A predicate over [`Value`]s.
///
/// A matcher may be evaluated many times by the polling engine. Evaluation
/// must not change the actual value in a way that changes the next verdict,
/// except for matchers that report [`Matcher::performed_side_effect`].
///
/// # Implementing Custom Matchers
///
/// ```rust
/// use testkit_poll::matcher::Matcher;
/// use testkit_poll::value::{format, Value};
/// use testkit_poll::{Error, Result};
///
/// struct BeEven;
///
/// impl Matcher for BeEven {
///     fn evaluate(&self, actual: &Value) -> Result<bool> {
///         match actual {
///             Value::Int(n) => Ok(n % 2 == 0),
///             other => Err(Error::type_mismatch("BeEven", "an int", format::object(other, 1))),
///         }
///     }
///
///     fn failure_message(&self, actual: &Value) -> String {
///         format::message_verb(actual, "to be even")
///     }
///
///     fn negated_failure_message(&self, actual: &Value) -> String {
///         format::message_verb(actual, "not to be even")
///     }
/// }
///
/// assert!(BeEven.evaluate(&Value::from(4)).unwrap());
/// assert!(!BeEven.evaluate(&Value::from(3)).unwrap());
/// assert!(BeEven.evaluate(&Value::from("4")).is_err());
/// ```
pub trait Matcher {
    /// Evaluate against `actual`.
    ///
    /// # Errors
    ///
    /// Returns an error when the matcher cannot meaningfully judge `actual`.
    fn evaluate(&self, actual: &Value) -> Result<bool>;

    /// Evaluate inside a polling attempt.
    ///
    /// Matchers that wait (send or receive) bound their wait by
    /// `cx` so they never outlive the poll budget or ignore cancellation.
    ///
    /// # Errors
    ///
    /// Same as [`Matcher::evaluate`].
    fn evaluate_in(&self, actual: &Value, cx: &EvalContext) -> Result<bool> {
        let _ = cx;
        self.evaluate(actual)
    }

    /// Explain a mismatch when a match was wanted.
    fn failure_message(&self, actual: &Value) -> String;

    /// Explain a match when a mismatch was wanted.
    fn negated_failure_message(&self, actual: &Value) -> String;

    /// Whether a later evaluation could reach a different verdict.
    fn may_change(&self, actual: &Value) -> bool {
        let _ = actual;
        true
    }

    /// Whether the last evaluation had an observable side effect.
    fn performed_side_effect(&self) -> bool {
        false
    }
}

impl<M: Matcher + ?Sized> Matcher for Box<M> {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        (**self).evaluate(actual)
    }

    fn evaluate_in(&self, actual: &Value, cx: &EvalContext) -> Result<bool> {
        (**self).evaluate_in(actual, cx)
    }

    fn failure_message(&self, actual: &Value) -> String {
        (**self).failure_message(actual)
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        (**self).negated_failure_message(actual)
    }

    fn may_change(&self, actual: &Value) -> bool {
        (**self).may_change(actual)
    }

    fn performed_side_effect(&self) -> bool {
        (**self).performed_side_effect()
    }
}

/// What a matcher may know about the polling attempt it runs in.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    remaining: Option<Duration>,
    cancel: CancelToken,
}

impl EvalContext {
    /// A context with `remaining` budget, watching `cancel`.
    #[must_use]
    pub fn new(remaining: Option<Duration>, cancel: CancelToken) -> Self {
        Self { remaining, cancel }
    }

    /// Budget left in the enclosing poll. `None` when unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining
    }

    /// The enclosing poll's cancellation token.
    #[must_use]
    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    /// Clamp a matcher's own wait window to the remaining budget.
    #[must_use]
    pub fn bound(&self, window: Duration) -> Duration {
        self.remaining.map_or(window, |remaining| remaining.min(window))
    }
}

/// Tri-state outcome of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The matcher matched.
    Matched,
    /// The matcher did not match; carries the failure explanation.
    Mismatched(String),
    /// The matcher could not judge the value.
    Errored(Error),
}

impl Verdict {
    /// Whether the matcher matched.
    #[must_use]
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched)
    }
}

/// Evaluate `matcher` once and fold the result into a [`Verdict`].
///
/// # Example
///
/// ```rust
/// use testkit_poll::matcher::{equal, verdict, Verdict};
/// use testkit_poll::value::Value;
///
/// assert_eq!(verdict(&equal(1), &Value::from(1)), Verdict::Matched);
/// assert!(matches!(verdict(&equal(1), &Value::from(2)), Verdict::Mismatched(_)));
/// ```
pub fn verdict(matcher: &dyn Matcher, actual: &Value) -> Verdict {
    match matcher.evaluate(actual) {
        Ok(true) => Verdict::Matched,
        Ok(false) => Verdict::Mismatched(matcher.failure_message(actual)),
        Err(err) => Verdict::Errored(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_context_bound() {
        let cx = EvalContext::new(Some(Duration::from_millis(5)), CancelToken::new());
        assert_eq!(cx.bound(Duration::from_millis(50)), Duration::from_millis(5));
        assert_eq!(cx.bound(Duration::from_millis(1)), Duration::from_millis(1));

        let unbounded = EvalContext::default();
        assert_eq!(unbounded.bound(Duration::from_secs(3)), Duration::from_secs(3));
    }

    #[test]
    fn test_boxed_matcher_delegates() {
        let boxed: Box<dyn Matcher> = Box::new(equal("foo"));
        assert!(boxed.evaluate(&Value::from("foo")).unwrap());
        assert!(boxed
            .failure_message(&Value::from("bar"))
            .contains("to equal"));
    }

    #[test]
    fn test_verdict_errored() {
        assert!(matches!(
            verdict(&be_empty(), &Value::Nil),
            Verdict::Errored(Error::TypeMismatch { .. })
        ));
    }
}
