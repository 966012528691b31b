//! Error matchers.

use std::fmt;

use super::{EvalContext, Matcher};
use crate::error::{Error, Result};
use crate::value::{format, ErrorValue, Value};

enum Expected {
    Error(ErrorValue),
    Message(String),
    Matcher(Box<dyn Matcher>),
    Invalid(Value),
}

/// Succeeds when the actual error matches `expected`.
///
/// - an error value matches if it structurally equals any link of the
///   actual error's cause chain
/// - a string matches the actual error's message exactly
/// - anything else is an invalid expectation
///
/// The actual value must be an error (or a pointer to one). An error is
/// always compared as an error, never through its message, so two errors of
/// different kinds with the same message do not match.
///
/// ```rust
/// use testkit_poll::matcher::{match_error, Matcher};
/// use testkit_poll::value::{ErrorValue, Value};
///
/// let inner = ErrorValue::new("inner error");
/// let outer = Value::from(ErrorValue::wrap("outer error wrapping: inner error", inner.clone()));
///
/// assert!(match_error(inner).evaluate(&outer).unwrap());
/// assert!(match_error("outer error wrapping: inner error").evaluate(&outer).unwrap());
/// ```
pub fn match_error(expected: impl Into<Value>) -> MatchError {
    let expected = expected.into();
    let expected = match expected.as_error() {
        Some(err) => Expected::Error(err.clone()),
        None => match expected {
            Value::Str(message) => Expected::Message(message),
            other => Expected::Invalid(other),
        },
    };
    MatchError { expected }
}

/// Succeeds when `matcher` matches the actual error's message.
///
/// Errors from `matcher` propagate unchanged.
///
/// ```rust
/// use testkit_poll::matcher::{contain_substring, match_error_with, Matcher};
/// use testkit_poll::value::{ErrorValue, Value};
///
/// let m = match_error_with(contain_substring("timeout"));
/// assert!(m.evaluate(&Value::from(ErrorValue::new("read timeout"))).unwrap());
/// ```
pub fn match_error_with(matcher: impl Matcher + 'static) -> MatchError {
    MatchError {
        expected: Expected::Matcher(Box::new(matcher)),
    }
}

/// Matcher returned by [`match_error`] and [`match_error_with`].
pub struct MatchError {
    expected: Expected,
}

impl fmt::Debug for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected = match &self.expected {
            Expected::Error(err) => format!("error {err:?}"),
            Expected::Message(message) => format!("message {message:?}"),
            Expected::Matcher(_) => "matcher".to_string(),
            Expected::Invalid(value) => format!("invalid {value:?}"),
        };
        f.debug_struct("MatchError").field("expected", &expected).finish()
    }
}

impl MatchError {
    fn actual_error<'a>(actual: &'a Value) -> Result<&'a ErrorValue> {
        actual.as_error().ok_or_else(|| {
            Error::type_mismatch("MatchError", "an error", format::object(actual, 1))
        })
    }

    fn expected_rendering(&self, actual: &Value, negated: bool) -> String {
        match &self.expected {
            Expected::Error(err) => format::object(&Value::Err(err.clone()), 1),
            Expected::Message(message) => format::object(&Value::from(message.as_str()), 1),
            Expected::Matcher(inner) => {
                let message = Value::from(
                    actual.as_error().map(ErrorValue::message).unwrap_or_default(),
                );
                let text = if negated {
                    inner.negated_failure_message(&message)
                } else {
                    inner.failure_message(&message)
                };
                format::indent_lines(&text, 1)
            }
            Expected::Invalid(value) => format::object(value, 1),
        }
    }
}

impl Matcher for MatchError {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        self.evaluate_in(actual, &EvalContext::default())
    }

    fn evaluate_in(&self, actual: &Value, cx: &EvalContext) -> Result<bool> {
        if let Expected::Invalid(value) = &self.expected {
            return Err(Error::invalid_expectation(format!(
                "MatchError must be passed an error, a string, or a matcher. Got:\n{}",
                format::object(value, 1)
            )));
        }
        let err = Self::actual_error(actual)?;
        match &self.expected {
            Expected::Error(expected) => Ok(err.is(expected)),
            Expected::Message(message) => Ok(err.message() == message),
            Expected::Matcher(inner) => inner.evaluate_in(&Value::from(err.message()), cx),
            Expected::Invalid(_) => Ok(false),
        }
    }

    fn failure_message(&self, actual: &Value) -> String {
        format!(
            "Expected\n{}\nto match error\n{}",
            format::object(actual, 1),
            self.expected_rendering(actual, false)
        )
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format!(
            "Expected\n{}\nnot to match error\n{}",
            format::object(actual, 1),
            self.expected_rendering(actual, true)
        )
    }
}

/// Succeeds when the actual value is an error.
///
/// Absence (and a nil pointer) means "no error occurred" and is a normal
/// mismatch. Values that are neither are errors.
pub fn have_occurred() -> HaveOccurred {
    HaveOccurred
}

/// Matcher returned by [`have_occurred`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HaveOccurred;

/// `Some(true)` for an error, `Some(false)` for absence, `None` otherwise.
fn error_present(actual: &Value) -> Option<bool> {
    if actual.as_error().is_some() {
        Some(true)
    } else if matches!(actual, Value::Nil | Value::Ptr(None)) {
        Some(false)
    } else {
        None
    }
}

impl Matcher for HaveOccurred {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        error_present(actual).ok_or_else(|| {
            Error::type_mismatch("HaveOccurred", "an error or nil", format::object(actual, 1))
        })
    }

    fn failure_message(&self, actual: &Value) -> String {
        format!(
            "Expected an error to have occurred. Got:\n{}",
            format::object(actual, 1)
        )
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format!("Unexpected error:\n{}\noccurred", format::object(actual, 1))
    }
}

/// Succeeds when the actual value is absence rather than an error.
pub fn succeed() -> Succeed {
    Succeed
}

/// Matcher returned by [`succeed`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Succeed;

impl Matcher for Succeed {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        error_present(actual)
            .map(|present| !present)
            .ok_or_else(|| {
                Error::type_mismatch("Succeed", "an error or nil", format::object(actual, 1))
            })
    }

    fn failure_message(&self, actual: &Value) -> String {
        format!(
            "Expected success, but got an error:\n{}",
            format::object(actual, 1)
        )
    }

    fn negated_failure_message(&self, _actual: &Value) -> String {
        "Expected failure, but got no error.".to_string()
    }
}
