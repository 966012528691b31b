//! Error definitions
//!
//! This module provides the error type shared by matchers, value sources and
//! the polling engine.
//!
//! Matchers distinguish "the assertion failed" (`Ok(false)`) from "the
//! assertion was nonsensical" (`Err(_)`). Every variant except
//! [`Error::NotReady`] is terminal for the polling engine.

use std::time::Duration;

use thiserror::Error;

/// Main error type for testkit-poll
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The actual value has the wrong kind for this matcher.
    #[error("{matcher} expects {expected}. Got:\n{actual}")]
    TypeMismatch {
        /// Name of the matcher that rejected the value.
        matcher: &'static str,
        /// What the matcher needed.
        expected: String,
        /// Rendering of the value it received.
        actual: String,
    },

    /// The value's kind has no defined semantics for this matcher.
    #[error("{matcher} has no meaning for {actual}")]
    UnsupportedInput {
        /// Name of the matcher that rejected the value.
        matcher: &'static str,
        /// Rendering of the value it received.
        actual: String,
    },

    /// A channel-like resource was closed where an open one was required.
    #[error("{0}")]
    ClosedResource(String),

    /// Polling exhausted its budget.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The cancellation token fired before a verdict was reached.
    #[error("Cancelled after {0:?}")]
    Cancelled(Duration),

    /// The polling policy cannot be honoured.
    #[error("Invalid polling policy: {0}")]
    InvalidPolicy(String),

    /// The matcher was constructed with an expectation it cannot use.
    #[error("Invalid expectation: {0}")]
    InvalidExpectation(String),

    /// A value source is not ready yet. The only retryable error.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// A value source failed.
    #[error("Source failed: {0}")]
    Source(String),

    /// Assertion failed
    #[error("Assertion failed: {0}")]
    AssertionFailed(String),
}

impl Error {
    /// Create a type mismatch error.
    #[must_use]
    pub fn type_mismatch(
        matcher: &'static str,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            matcher,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an unsupported input error.
    #[must_use]
    pub fn unsupported(matcher: &'static str, actual: impl Into<String>) -> Self {
        Self::UnsupportedInput {
            matcher,
            actual: actual.into(),
        }
    }

    /// Create a closed resource error.
    #[must_use]
    pub fn closed(message: impl Into<String>) -> Self {
        Self::ClosedResource(message.into())
    }

    /// Create an invalid policy error.
    #[must_use]
    pub fn invalid_policy(message: impl Into<String>) -> Self {
        Self::InvalidPolicy(message.into())
    }

    /// Create an invalid expectation error.
    #[must_use]
    pub fn invalid_expectation(message: impl Into<String>) -> Self {
        Self::InvalidExpectation(message.into())
    }

    /// Create a "not ready yet" error for value sources.
    #[must_use]
    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::NotReady(message.into())
    }

    /// Create a source failure error.
    #[must_use]
    pub fn source(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }

    /// Whether the polling engine may retry after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
