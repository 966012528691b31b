//! Integration tests for `match_error`, `have_occurred` and `point_to`.

use testkit_poll::prelude::*;

fn err(message: &str) -> Value {
    Value::from(ErrorValue::new(message))
}

/// A custom error type, captured the way a test would capture any
/// `std::error::Error`.
#[derive(Debug, thiserror::Error)]
#[error("an error")]
struct CustomError;

#[derive(Debug, thiserror::Error)]
#[error("request failed")]
struct RequestError {
    #[source]
    cause: std::io::Error,
}

/// Displays like a string but is an error.
#[derive(Debug, thiserror::Error)]
#[error("lost connection to {0}")]
struct Disconnected(&'static str);

#[derive(Debug, thiserror::Error)]
#[error("lost connection to {0}")]
struct OtherDisconnected(&'static str);

#[test]
fn test_deeply_equal_errors_match() {
    expect(err("an error")).should(match_error(ErrorValue::new("an error")));
    expect(err("an error")).should_not(match_error(ErrorValue::new("another error")));

    let custom = ErrorValue::capture(&CustomError);
    expect(custom).should(match_error(ErrorValue::capture(&CustomError)));
}

/// Equal messages are not enough when the kinds differ.
#[test]
fn test_error_kind_takes_part_in_equality() {
    let custom = ErrorValue::capture(&CustomError);
    assert_eq!(custom.kind(), "CustomError");
    expect(custom).should_not(match_error(ErrorValue::new("an error")));
}

#[test]
fn test_any_link_of_the_chain_matches() {
    let inner = ErrorValue::new("inner error");
    let outer = ErrorValue::wrap("outer error wrapping: inner error", inner.clone());
    expect(outer.clone()).should(match_error(inner));
    expect(outer).should_not(match_error(ErrorValue::new("unrelated")));
}

/// Captured source chains are walked too.
#[test]
fn test_captured_source_chain_matches() {
    let failure = RequestError {
        cause: std::io::Error::other("connection reset"),
    };
    let captured = ErrorValue::capture(&failure);

    expect(captured.clone()).should(match_error("request failed"));
    expect(captured).should(match_error(ErrorValue::new("connection reset")));
}

#[test]
fn test_pointers_to_errors_match() {
    let custom = ErrorValue::capture(&CustomError);
    let ptr = Value::ptr(custom.clone());
    expect(ptr.clone()).should(match_error(ptr));
    expect(Value::ptr(custom.clone())).should(match_error(custom));
}

#[test]
fn test_message_strings_match() {
    expect(err("an error")).should(match_error("an error"));
    expect(err("an error")).should_not(match_error("another error"));
    expect(ErrorValue::capture(&CustomError)).should(match_error("an error"));
}

/// A value that displays as text is still compared as an error.
#[test]
fn test_displayable_error_is_compared_as_error() {
    let actual = ErrorValue::capture(&Disconnected("db"));
    assert_eq!(actual.message(), "lost connection to db");

    expect(actual.clone()).should(match_error("lost connection to db"));
    expect(actual.clone()).should_not(match_error("lost connection to cache"));

    expect(actual.clone()).should(match_error(ErrorValue::capture(&Disconnected("db"))));
    expect(actual.clone()).should_not(match_error(ErrorValue::capture(&Disconnected("cache"))));

    // Same text, different error: not a match
    expect(actual.clone()).should_not(match_error(ErrorValue::capture(&OtherDisconnected("db"))));
    expect(actual.clone()).should_not(match_error(ErrorValue::new("lost connection to db")));

    // The error does not stand in for its message
    expect(actual).should_not(equal("lost connection to db"));
}

#[test]
fn test_nested_matcher_applies_to_message() {
    expect(err("error 123 abc")).should(match_error_with(match_regexp(r"\d{3}")));
    expect(err("no digits")).should_not(match_error_with(match_regexp(r"\d")));
}

#[test]
fn test_invalid_expectations_error() {
    let actual = err("an error");
    assert!(matches!(
        match_error(Value::bytes("an error")).evaluate(&actual),
        Err(Error::InvalidExpectation(_))
    ));
    assert!(matches!(
        match_error(3).evaluate(&actual),
        Err(Error::InvalidExpectation(_))
    ));
}

#[test]
fn test_non_error_actuals_error() {
    for actual in [Value::Nil, Value::from("an error"), Value::from(3)] {
        assert!(
            matches!(
                match_error("an error").evaluate(&actual),
                Err(Error::TypeMismatch { matcher: "MatchError", .. })
            ),
            "{actual:?} should be rejected"
        );
    }
}

#[test]
fn test_failure_message() {
    let failures = intercept_failures(|| {
        expect(err("foo")).should(match_error("bar"));
    });
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("<error>: foo\nto match error\n    <string>: bar"));
}

#[test]
fn test_negated_failure_message() {
    let failures = intercept_failures(|| {
        expect(err("foo")).should_not(match_error("foo"));
    });
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("<error>: foo\nnot to match error\n    <string>: foo"));
}

#[test]
fn test_have_occurred_and_succeed() {
    expect(err("boom")).should(have_occurred());
    expect(Value::Nil).should_not(have_occurred());
    expect(Value::nil_ptr()).should(succeed());
    expect(err("boom")).should_not(succeed());
    assert!(have_occurred().evaluate(&Value::from(1)).is_err());
}

#[test]
fn test_point_to_nil_pointer() {
    expect(Value::nil_ptr()).should(be_nil());
    assert!(point_to(ignore()).evaluate(&Value::nil_ptr()).is_err());
}

#[test]
fn test_point_to_unwraps_the_pointee() {
    expect(Value::ptr(Value::from(Vec::<i32>::new()))).should(point_to(ignore()));
    expect(Value::ptr(1)).should(point_to(equal(1)));
    expect(Value::ptr(1)).should_not(point_to(equal(2)));
}

#[test]
fn test_point_to_nested_pointers() {
    let ipp = Value::ptr(Value::ptr(1));
    expect(ipp.clone()).should(point_to(point_to(equal(1))));
    expect(ipp).should_not(point_to(point_to(equal(2))));
}

/// Absence is a plain mismatch for `have_occurred`, so polling waits for
/// the error to show up.
#[test]
fn test_eventually_error_occurs() {
    let mut calls = 0;
    eventually_fn(move || {
        calls += 1;
        if calls < 3 {
            Value::Nil
        } else {
            Value::from(ErrorValue::new("disk full"))
        }
    })
    .within(std::time::Duration::from_secs(1))
    .polling_every(std::time::Duration::from_millis(1))
    .should(have_occurred());
}
