//! Equality and scalar matchers.

use std::fmt;

use super::Matcher;
use crate::error::{Error, Result};
use crate::value::{format, Value};

/// Succeeds when the actual value deeply equals the expected one.
///
/// Comparing `Nil` to `Nil` is refused; use [`be_nil`] to assert absence.
///
/// ```rust
/// use testkit_poll::matcher::{equal, Matcher};
/// use testkit_poll::value::Value;
///
/// assert!(equal(vec![1, 2]).evaluate(&Value::from([1, 2])).unwrap());
/// assert!(equal(Value::Nil).evaluate(&Value::Nil).is_err());
/// ```
pub fn equal(expected: impl Into<Value>) -> Equal {
    Equal {
        expected: expected.into(),
    }
}

/// Matcher returned by [`equal`].
#[derive(Debug, Clone)]
pub struct Equal {
    expected: Value,
}

impl Matcher for Equal {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        if matches!(actual, Value::Nil) && matches!(self.expected, Value::Nil) {
            return Err(Error::invalid_expectation(
                "refusing to compare <nil> to <nil>; use be_nil() instead",
            ));
        }
        Ok(actual == &self.expected)
    }

    fn failure_message(&self, actual: &Value) -> String {
        format::message(actual, "to equal", &self.expected)
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format::message(actual, "not to equal", &self.expected)
    }
}

/// Succeeds for untyped absence and for typed nils.
pub fn be_nil() -> BeNil {
    BeNil
}

/// Matcher returned by [`be_nil`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BeNil;

impl Matcher for BeNil {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        Ok(actual.is_nil())
    }

    fn failure_message(&self, actual: &Value) -> String {
        format::message_verb(actual, "to be nil")
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format::message_verb(actual, "not to be nil")
    }
}

/// Succeeds for `true`. Non-booleans are an error.
pub fn be_true() -> BeBool {
    BeBool { expected: true }
}

/// Succeeds for `false`. Non-booleans are an error.
pub fn be_false() -> BeBool {
    BeBool { expected: false }
}

/// Matcher returned by [`be_true`] and [`be_false`].
#[derive(Debug, Clone, Copy)]
pub struct BeBool {
    expected: bool,
}

impl Matcher for BeBool {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        match actual {
            Value::Bool(b) => Ok(*b == self.expected),
            other => Err(Error::type_mismatch(
                if self.expected { "BeTrue" } else { "BeFalse" },
                "a bool",
                format::object(other, 1),
            )),
        }
    }

    fn failure_message(&self, actual: &Value) -> String {
        format::message_verb(actual, &format!("to be {}", self.expected))
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format::message_verb(actual, &format!("not to be {}", self.expected))
    }
}

/// Succeeds for any value, including absence.
pub fn ignore() -> Ignore {
    Ignore
}

/// Matcher returned by [`ignore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Ignore;

impl Matcher for Ignore {
    fn evaluate(&self, _actual: &Value) -> Result<bool> {
        Ok(true)
    }

    fn failure_message(&self, actual: &Value) -> String {
        format::message_verb(actual, "to be anything")
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format::message_verb(actual, "to be nothing, which nothing is")
    }

    fn may_change(&self, _actual: &Value) -> bool {
        false
    }
}

/// Succeeds when `predicate` returns `true`.
///
/// ```rust
/// use testkit_poll::matcher::{satisfy, Matcher};
/// use testkit_poll::value::Value;
///
/// let m = satisfy("an odd int", |v| matches!(v, Value::Int(n) if n % 2 == 1));
/// assert!(m.evaluate(&Value::from(3)).unwrap());
/// ```
pub fn satisfy<F>(description: impl Into<String>, predicate: F) -> Satisfy<F>
where
    F: Fn(&Value) -> bool,
{
    Satisfy {
        description: description.into(),
        predicate,
    }
}

/// Matcher returned by [`satisfy`].
pub struct Satisfy<F> {
    description: String,
    predicate: F,
}

impl<F> fmt::Debug for Satisfy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Satisfy")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F: Fn(&Value) -> bool> Matcher for Satisfy<F> {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        Ok((self.predicate)(actual))
    }

    fn failure_message(&self, actual: &Value) -> String {
        format::message_text(actual, "to satisfy", &self.description)
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format::message_text(actual, "not to satisfy", &self.description)
    }
}

/// Numeric comparison used by [`be_numerically`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparison {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// Within the given absolute tolerance.
    Within(f64),
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => f.write_str("=="),
            Self::Ne => f.write_str("!="),
            Self::Lt => f.write_str("<"),
            Self::Le => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::Ge => f.write_str(">="),
            Self::Within(tolerance) => write!(f, "~ (within {tolerance})"),
        }
    }
}

/// Compares numbers of any numeric kind.
///
/// Integers compare exactly; anything involving a float compares as `f64`.
///
/// ```rust
/// use testkit_poll::matcher::{be_numerically, Comparison, Matcher};
/// use testkit_poll::value::Value;
///
/// assert!(be_numerically(Comparison::Gt, 2).evaluate(&Value::from(3u8)).unwrap());
/// assert!(be_numerically(Comparison::Within(0.1), 1.0).evaluate(&Value::from(1.05)).unwrap());
/// ```
pub fn be_numerically(comparison: Comparison, expected: impl Into<Value>) -> BeNumerically {
    BeNumerically {
        comparison,
        expected: expected.into(),
    }
}

/// Matcher returned by [`be_numerically`].
#[derive(Debug, Clone)]
pub struct BeNumerically {
    comparison: Comparison,
    expected: Value,
}

fn as_i128(value: &Value) -> Option<i128> {
    match value {
        Value::Int(i) => Some(i128::from(*i)),
        Value::Uint(u) => Some(i128::from(*u)),
        _ => None,
    }
}

fn compare<T: PartialOrd>(comparison: Comparison, actual: T, expected: T) -> bool {
    match comparison {
        Comparison::Eq => actual == expected,
        Comparison::Ne => actual != expected,
        Comparison::Lt => actual < expected,
        Comparison::Le => actual <= expected,
        Comparison::Gt => actual > expected,
        Comparison::Ge => actual >= expected,
        Comparison::Within(_) => false,
    }
}

impl Matcher for BeNumerically {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        let Some(expected) = self.expected.as_f64() else {
            return Err(Error::invalid_expectation(format!(
                "BeNumerically needs a number to compare against, got {}",
                format::object(&self.expected, 0)
            )));
        };
        let Some(actual_f) = actual.as_f64() else {
            return Err(Error::type_mismatch(
                "BeNumerically",
                "a number",
                format::object(actual, 1),
            ));
        };
        if let Comparison::Within(tolerance) = self.comparison {
            return Ok((actual_f - expected).abs() <= tolerance);
        }
        Ok(match (as_i128(actual), as_i128(&self.expected)) {
            (Some(a), Some(e)) => compare(self.comparison, a, e),
            _ => compare(self.comparison, actual_f, expected),
        })
    }

    fn failure_message(&self, actual: &Value) -> String {
        format::message(actual, &format!("to be {}", self.comparison), &self.expected)
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format::message(actual, &format!("not to be {}", self.comparison), &self.expected)
    }
}
