//! Length-based matchers shared by strings, containers and channels.

use super::Matcher;
use crate::error::Result;
use crate::value::{format, length_of, Value};

/// Succeeds when a string, byte buffer, list, map or channel holds nothing.
///
/// Typed nil containers are empty. A channel is empty when nothing is
/// buffered; checking never consumes a value. Untyped absence and scalars
/// are errors.
///
/// ```rust
/// use testkit_poll::matcher::{be_empty, Matcher};
/// use testkit_poll::value::Value;
///
/// assert!(be_empty().evaluate(&Value::nil_map()).unwrap());
/// assert!(be_empty().evaluate(&Value::Nil).is_err());
/// ```
pub fn be_empty() -> BeEmpty {
    BeEmpty
}

/// Matcher returned by [`be_empty`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BeEmpty;

impl Matcher for BeEmpty {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        Ok(length_of(actual, "BeEmpty")? == 0)
    }

    fn failure_message(&self, actual: &Value) -> String {
        format::message_verb(actual, "to be empty")
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format::message_verb(actual, "not to be empty")
    }
}

/// Succeeds when the length equals `expected`.
pub fn have_len(expected: usize) -> HaveLen {
    HaveLen { expected }
}

/// Matcher returned by [`have_len`].
#[derive(Debug, Clone, Copy)]
pub struct HaveLen {
    expected: usize,
}

impl Matcher for HaveLen {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        Ok(length_of(actual, "HaveLen")? == self.expected)
    }

    fn failure_message(&self, actual: &Value) -> String {
        format::message_text(
            actual,
            "to have length",
            &self.expected.to_string(),
        )
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format::message_text(
            actual,
            "not to have length",
            &self.expected.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::chan::Chan;
    use crate::error::Error;
    use crate::value::{ErrorValue, Kind};

    #[test]
    fn test_be_empty_over_containers() {
        assert!(be_empty().evaluate(&Value::from("")).unwrap());
        assert!(!be_empty().evaluate(&Value::from("a")).unwrap());
        assert!(be_empty().evaluate(&Value::bytes(Vec::new())).unwrap());
        assert!(be_empty().evaluate(&Value::from(Vec::<i32>::new())).unwrap());
        assert!(!be_empty().evaluate(&Value::from(vec![1])).unwrap());
        assert!(be_empty()
            .evaluate(&Value::from(BTreeMap::<String, i32>::new()))
            .unwrap());
    }

    #[test]
    fn test_typed_nil_is_empty_but_absence_errors() {
        assert!(be_empty().evaluate(&Value::nil_list()).unwrap());
        assert!(be_empty().evaluate(&Value::nil_map()).unwrap());
        assert!(matches!(
            be_empty().evaluate(&Value::Nil),
            Err(Error::TypeMismatch { matcher: "BeEmpty", .. })
        ));
    }

    #[test]
    fn test_be_empty_rejects_scalars() {
        for value in [
            Value::from(0),
            Value::from(false),
            Value::from(0.0),
            Value::from(ErrorValue::new("")),
        ] {
            assert!(matches!(
                be_empty().evaluate(&value),
                Err(Error::UnsupportedInput { .. })
            ));
        }
    }

    #[test]
    fn test_be_empty_on_channel_does_not_consume() {
        let c = Chan::buffered(Kind::Int, 2);
        assert!(be_empty().evaluate(&Value::from(&c)).unwrap());

        c.try_send(1).unwrap();
        assert!(!be_empty().evaluate(&Value::from(&c)).unwrap());
        assert!(!be_empty().evaluate(&Value::from(&c)).unwrap());
        assert_eq!(c.try_recv().unwrap(), Value::from(1));
        assert!(be_empty().evaluate(&Value::from(&c)).unwrap());

        // Direction does not matter for emptiness
        let recv_only = c.recv_only().unwrap();
        assert!(be_empty().evaluate(&Value::from(recv_only)).unwrap());
    }

    #[test]
    fn test_have_len() {
        assert!(have_len(3).evaluate(&Value::from("abc")).unwrap());
        assert!(have_len(0).evaluate(&Value::nil_list()).unwrap());
        assert!(!have_len(1).evaluate(&Value::from(vec![1, 2])).unwrap());
        assert!(have_len(1).evaluate(&Value::from(3)).is_err());
        assert_eq!(
            have_len(2).failure_message(&Value::from("a")),
            "Expected\n    <string>: a\nto have length\n    2"
        );
    }
}
