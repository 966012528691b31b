//! Text matchers.

use std::borrow::Cow;

use regex::Regex;

use super::Matcher;
use crate::error::{Error, Result};
use crate::value::{format, Value};

/// The text of a string or byte buffer.
fn text_of<'a>(actual: &'a Value, matcher: &'static str) -> Result<Cow<'a, str>> {
    match actual {
        Value::Str(s) => Ok(Cow::Borrowed(s)),
        Value::Bytes(b) => Ok(String::from_utf8_lossy(b)),
        other => Err(Error::type_mismatch(
            matcher,
            "a string or bytes",
            format::object(other, 1),
        )),
    }
}

/// Succeeds when the text contains `needle`.
pub fn contain_substring(needle: impl Into<String>) -> ContainSubstring {
    ContainSubstring {
        needle: needle.into(),
    }
}

/// Matcher returned by [`contain_substring`].
#[derive(Debug, Clone)]
pub struct ContainSubstring {
    needle: String,
}

impl Matcher for ContainSubstring {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        Ok(text_of(actual, "ContainSubstring")?.contains(self.needle.as_str()))
    }

    fn failure_message(&self, actual: &Value) -> String {
        format::message_text(actual, "to contain substring", &self.needle)
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format::message_text(actual, "not to contain substring", &self.needle)
    }
}

/// Succeeds when the text starts with `prefix`.
pub fn have_prefix(prefix: impl Into<String>) -> HavePrefix {
    HavePrefix {
        prefix: prefix.into(),
    }
}

/// Matcher returned by [`have_prefix`].
#[derive(Debug, Clone)]
pub struct HavePrefix {
    prefix: String,
}

impl Matcher for HavePrefix {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        Ok(text_of(actual, "HavePrefix")?.starts_with(self.prefix.as_str()))
    }

    fn failure_message(&self, actual: &Value) -> String {
        format::message_text(actual, "to have prefix", &self.prefix)
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format::message_text(actual, "not to have prefix", &self.prefix)
    }
}

/// Succeeds when the text matches the regular expression `pattern`.
///
/// An invalid pattern is reported as an error on evaluation.
///
/// ```rust
/// use testkit_poll::matcher::{match_regexp, Matcher};
/// use testkit_poll::value::Value;
///
/// assert!(match_regexp(r"^fo+$").evaluate(&Value::from("fooo")).unwrap());
/// assert!(match_regexp(r"(").evaluate(&Value::from("(")).is_err());
/// ```
pub fn match_regexp(pattern: &str) -> MatchRegexp {
    MatchRegexp {
        pattern: pattern.to_string(),
        regex: Regex::new(pattern).map_err(|err| err.to_string()),
    }
}

/// Matcher returned by [`match_regexp`].
#[derive(Debug, Clone)]
pub struct MatchRegexp {
    pattern: String,
    regex: std::result::Result<Regex, String>,
}

impl Matcher for MatchRegexp {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        let regex = self.regex.as_ref().map_err(|err| {
            Error::invalid_expectation(format!(
                "MatchRegexp got an invalid pattern {:?}: {err}",
                self.pattern
            ))
        })?;
        Ok(regex.is_match(&text_of(actual, "MatchRegexp")?))
    }

    fn failure_message(&self, actual: &Value) -> String {
        format::message_text(actual, "to match regular expression", &self.pattern)
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format::message_text(actual, "not to match regular expression", &self.pattern)
    }
}
