//! Logical combinators.

use parking_lot::Mutex;

use super::{EvalContext, Matcher};
use crate::error::Result;
use crate::value::Value;

/// Inverts a matcher. Errors from the inner matcher propagate unchanged.
///
/// ```rust
/// use testkit_poll::matcher::{equal, not, Matcher};
/// use testkit_poll::value::Value;
///
/// assert!(not(equal(0)).evaluate(&Value::from(1)).unwrap());
/// ```
pub fn not<M: Matcher>(inner: M) -> Not<M> {
    Not { inner }
}

/// Matcher returned by [`not`].
#[derive(Debug, Clone)]
pub struct Not<M> {
    inner: M,
}

impl<M: Matcher> Matcher for Not<M> {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        Ok(!self.inner.evaluate(actual)?)
    }

    fn evaluate_in(&self, actual: &Value, cx: &EvalContext) -> Result<bool> {
        Ok(!self.inner.evaluate_in(actual, cx)?)
    }

    fn failure_message(&self, actual: &Value) -> String {
        self.inner.negated_failure_message(actual)
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        self.inner.failure_message(actual)
    }

    fn may_change(&self, actual: &Value) -> bool {
        self.inner.may_change(actual)
    }

    fn performed_side_effect(&self) -> bool {
        self.inner.performed_side_effect()
    }
}

/// Succeeds when every matcher succeeds, evaluating in order and stopping at
/// the first mismatch or error.
///
/// ```rust
/// use testkit_poll::matcher::{and, have_len, have_prefix, Matcher};
/// use testkit_poll::value::Value;
///
/// let m = and(vec![Box::new(have_prefix("f")), Box::new(have_len(3))]);
/// assert!(m.evaluate(&Value::from("foo")).unwrap());
/// assert!(!m.evaluate(&Value::from("fo")).unwrap());
/// ```
pub fn and(matchers: Vec<Box<dyn Matcher>>) -> And {
    And {
        matchers,
        failed: Mutex::new(None),
    }
}

/// Matcher returned by [`and`].
pub struct And {
    matchers: Vec<Box<dyn Matcher>>,
    /// Index of the matcher that failed in the last evaluation
    failed: Mutex<Option<usize>>,
}

impl std::fmt::Debug for And {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("And")
            .field("matchers", &self.matchers.len())
            .field("failed", &*self.failed.lock())
            .finish()
    }
}

impl Matcher for And {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        self.evaluate_in(actual, &EvalContext::default())
    }

    fn evaluate_in(&self, actual: &Value, cx: &EvalContext) -> Result<bool> {
        *self.failed.lock() = None;
        for (index, matcher) in self.matchers.iter().enumerate() {
            if !matcher.evaluate_in(actual, cx)? {
                *self.failed.lock() = Some(index);
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn failure_message(&self, actual: &Value) -> String {
        let failed = *self.failed.lock();
        match failed.and_then(|index| self.matchers.get(index)) {
            Some(matcher) => matcher.failure_message(actual),
            None => "Expected every matcher to succeed".to_string(),
        }
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        let messages: Vec<_> = self
            .matchers
            .iter()
            .map(|m| m.failure_message(actual))
            .collect();
        format!(
            "Expected not all of these to succeed, but they did:\n{}",
            messages.join("\n")
        )
    }

    fn may_change(&self, actual: &Value) -> bool {
        let failed = *self.failed.lock();
        match failed.and_then(|index| self.matchers.get(index)) {
            Some(matcher) => matcher.may_change(actual),
            None => self.matchers.iter().any(|m| m.may_change(actual)),
        }
    }

    fn performed_side_effect(&self) -> bool {
        self.matchers.iter().any(|m| m.performed_side_effect())
    }
}

/// Succeeds when any matcher succeeds, evaluating in order and stopping at
/// the first match or error.
pub fn or(matchers: Vec<Box<dyn Matcher>>) -> Or {
    Or {
        matchers,
        matched: Mutex::new(None),
    }
}

/// Matcher returned by [`or`].
pub struct Or {
    matchers: Vec<Box<dyn Matcher>>,
    /// Index of the matcher that succeeded in the last evaluation
    matched: Mutex<Option<usize>>,
}

impl std::fmt::Debug for Or {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Or")
            .field("matchers", &self.matchers.len())
            .field("matched", &*self.matched.lock())
            .finish()
    }
}

impl Matcher for Or {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        self.evaluate_in(actual, &EvalContext::default())
    }

    fn evaluate_in(&self, actual: &Value, cx: &EvalContext) -> Result<bool> {
        *self.matched.lock() = None;
        for (index, matcher) in self.matchers.iter().enumerate() {
            if matcher.evaluate_in(actual, cx)? {
                *self.matched.lock() = Some(index);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn failure_message(&self, actual: &Value) -> String {
        let messages: Vec<_> = self
            .matchers
            .iter()
            .map(|m| m.failure_message(actual))
            .collect();
        format!(
            "Expected at least one of these to succeed, but none did:\n{}",
            messages.join("\n")
        )
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        let matched = *self.matched.lock();
        match matched.and_then(|index| self.matchers.get(index)) {
            Some(matcher) => matcher.negated_failure_message(actual),
            None => "Expected no matcher to succeed".to_string(),
        }
    }

    fn may_change(&self, actual: &Value) -> bool {
        let matched = *self.matched.lock();
        match matched.and_then(|index| self.matchers.get(index)) {
            Some(matcher) => matcher.may_change(actual),
            None => self.matchers.iter().any(|m| m.may_change(actual)),
        }
    }

    fn performed_side_effect(&self) -> bool {
        self.matchers.iter().any(|m| m.performed_side_effect())
    }
}
