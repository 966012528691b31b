//! Rendering values for failure messages.
//!
//! Failure messages follow one layout:
//!
//! ```text
//! Expected
//!     <string>: foo
//! to equal
//!     <string>: bar
//! ```

use super::Value;

const INDENT: &str = "    ";

/// Render a value as `<type>: repr`, indented `indent` levels.
///
/// # Example
///
/// ```rust
/// use testkit_poll::value::{format, Value};
///
/// assert_eq!(format::object(&Value::from("foo"), 1), "    <string>: foo");
/// ```
#[must_use]
pub fn object(value: &Value, indent: usize) -> String {
    format!("{}<{}>: {}", INDENT.repeat(indent), value.type_name(), repr(value))
}

/// Render the standard two-sided failure message.
#[must_use]
pub fn message(actual: &Value, verb: &str, expected: &Value) -> String {
    format!("Expected\n{}\n{verb}\n{}", object(actual, 1), object(expected, 1))
}

/// Render a one-sided failure message, e.g. `to be empty`.
#[must_use]
pub fn message_verb(actual: &Value, verb: &str) -> String {
    format!("Expected\n{}\n{verb}", object(actual, 1))
}

/// Render a failure message whose expectation is free text.
#[must_use]
pub fn message_text(actual: &Value, verb: &str, expectation: &str) -> String {
    format!(
        "Expected\n{}\n{verb}\n{}",
        object(actual, 1),
        indent_lines(expectation, 1)
    )
}

/// Indent every line of `text`.
#[must_use]
pub fn indent_lines(text: &str, indent: usize) -> String {
    let pad = INDENT.repeat(indent);
    text.lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a value without its type tag.
///
/// Top-level strings render raw; strings nested inside containers are
/// quoted so element boundaries stay visible.
#[must_use]
pub fn repr(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => nested(other),
    }
}

fn nested(value: &Value) -> String {
    match value {
        Value::Nil | Value::List(None) | Value::Map(None) | Value::Ptr(None) => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Uint(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => format!("{s:?}"),
        Value::Bytes(b) => format!("{b:?}"),
        Value::List(Some(items)) => {
            let rendered: Vec<_> = items.iter().map(nested).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Map(Some(entries)) => {
            let rendered: Vec<_> = entries
                .iter()
                .map(|(k, v)| format!("{k:?}: {}", nested(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
        Value::Chan(handle) => handle.describe(),
        Value::Err(err) => err.message().to_string(),
        Value::Ptr(Some(target)) => format!("&{}", nested(target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ErrorValue;

    #[test]
    fn test_object_rendering() {
        assert_eq!(object(&Value::from(3), 0), "<int>: 3");
        assert_eq!(object(&Value::Nil, 0), "<nil>: nil");
        assert_eq!(
            object(&Value::from(ErrorValue::new("foo")), 1),
            "    <error>: foo"
        );
    }

    #[test]
    fn test_nested_strings_are_quoted() {
        assert_eq!(repr(&Value::from(vec!["a", "b"])), "[\"a\", \"b\"]");
        assert_eq!(repr(&Value::from("a")), "a");
    }

    #[test]
    fn test_message_layout() {
        let msg = message(
            &Value::from(ErrorValue::new("foo")),
            "to match error",
            &Value::from("bar"),
        );
        assert_eq!(
            msg,
            "Expected\n    <error>: foo\nto match error\n    <string>: bar"
        );
    }

    #[test]
    fn test_indent_lines() {
        assert_eq!(indent_lines("a\nb", 1), "    a\n    b");
    }
}
