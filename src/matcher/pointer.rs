//! Pointer decorator.

use super::{EvalContext, Matcher};
use crate::error::{Error, Result};
use crate::value::{format, Value};

/// Dereferences one pointer and applies `inner` to the pointee.
///
/// A nil pointer or a non-pointer is an error; `inner` is not evaluated.
///
/// ```rust
/// use testkit_poll::matcher::{equal, point_to, Matcher};
/// use testkit_poll::value::Value;
///
/// assert!(point_to(equal("foo")).evaluate(&Value::ptr("foo")).unwrap());
/// assert!(point_to(equal("foo")).evaluate(&Value::nil_ptr()).is_err());
/// ```
pub fn point_to<M: Matcher>(inner: M) -> PointTo<M> {
    PointTo { inner }
}

/// Matcher returned by [`point_to`].
#[derive(Debug, Clone)]
pub struct PointTo<M> {
    inner: M,
}

fn deref(actual: &Value) -> Result<&Value> {
    match actual {
        Value::Ptr(Some(target)) => Ok(target),
        Value::Ptr(None) => Err(Error::type_mismatch(
            "PointTo",
            "a non-nil pointer",
            format::object(actual, 1),
        )),
        other => Err(Error::type_mismatch(
            "PointTo",
            "a pointer",
            format::object(other, 1),
        )),
    }
}

impl<M: Matcher> Matcher for PointTo<M> {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        self.inner.evaluate(deref(actual)?)
    }

    fn evaluate_in(&self, actual: &Value, cx: &EvalContext) -> Result<bool> {
        self.inner.evaluate_in(deref(actual)?, cx)
    }

    fn failure_message(&self, actual: &Value) -> String {
        match deref(actual) {
            Ok(target) => self.inner.failure_message(target),
            Err(err) => err.to_string(),
        }
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        match deref(actual) {
            Ok(target) => self.inner.negated_failure_message(target),
            Err(err) => err.to_string(),
        }
    }

    fn may_change(&self, actual: &Value) -> bool {
        deref(actual).map_or(true, |target| self.inner.may_change(target))
    }

    fn performed_side_effect(&self) -> bool {
        self.inner.performed_side_effect()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::matcher::{be_empty, equal, not};

    /// Records whether it was ever evaluated.
    struct Probe<'a>(&'a Cell<bool>);

    impl Matcher for Probe<'_> {
        fn evaluate(&self, _actual: &Value) -> Result<bool> {
            self.0.set(true);
            Ok(true)
        }

        fn failure_message(&self, _actual: &Value) -> String {
            String::new()
        }

        fn negated_failure_message(&self, _actual: &Value) -> String {
            String::new()
        }
    }

    #[test]
    fn test_point_to_dereferences() {
        assert!(point_to(equal(5)).evaluate(&Value::ptr(5)).unwrap());
        assert!(!point_to(equal(5)).evaluate(&Value::ptr(6)).unwrap());
        assert!(point_to(not(equal(5))).evaluate(&Value::ptr(6)).unwrap());
    }

    #[test]
    fn test_nil_pointer_short_circuits() {
        let seen = Cell::new(false);
        let err = point_to(Probe(&seen))
            .evaluate(&Value::nil_ptr())
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { matcher: "PointTo", .. }));
        assert!(!seen.get());
    }

    #[test]
    fn test_non_pointer_errors() {
        assert!(point_to(equal(5)).evaluate(&Value::from(5)).is_err());
        assert!(point_to(equal(5)).evaluate(&Value::Nil).is_err());
    }

    #[test]
    fn test_inner_errors_propagate_verbatim() {
        let err = point_to(be_empty()).evaluate(&Value::ptr(3)).unwrap_err();
        assert_eq!(err, be_empty().evaluate(&Value::from(3)).unwrap_err());
    }

    #[test]
    fn test_failure_message_uses_pointee() {
        let message = point_to(equal("bar")).failure_message(&Value::ptr("foo"));
        assert_eq!(
            message,
            "Expected\n    <string>: foo\nto equal\n    <string>: bar"
        );
    }
}
