//! Structural error values.

use std::fmt;
use std::sync::Arc;

/// An error carried as a [`Value`](super::Value).
///
/// Two error values are equal when their kind, message and whole cause chain
/// are equal; identity never matters. [`ErrorValue::chain`] walks the error
/// and every wrapped cause, which is what [`match_error`] uses to find an
/// expected error anywhere in a chain.
///
/// [`match_error`]: crate::matcher::match_error
///
/// # Example
///
/// ```rust
/// use testkit_poll::value::ErrorValue;
///
/// let inner = ErrorValue::new("inner error");
/// let outer = ErrorValue::wrap("outer error wrapping: inner error", inner.clone());
///
/// assert!(outer.is(&inner));
/// assert!(!inner.is(&outer));
/// assert_eq!(ErrorValue::new("an error"), ErrorValue::new("an error"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    kind: String,
    message: String,
    cause: Option<Arc<ErrorValue>>,
}

impl ErrorValue {
    /// Create a plain error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self::of_kind("error", message)
    }

    /// Create an error of a named kind, e.g. a custom error type.
    #[must_use]
    pub fn of_kind(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Create an error that wraps `cause`.
    ///
    /// `message` is the full rendered message of the wrapper.
    #[must_use]
    pub fn wrap(message: impl Into<String>, cause: ErrorValue) -> Self {
        Self::new(message).with_cause(cause)
    }

    /// Attach a cause to this error.
    #[must_use]
    pub fn with_cause(mut self, cause: ErrorValue) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Capture a Rust error, following its `source()` chain.
    ///
    /// The outermost link takes its kind from the error's type name; sources
    /// are only visible as trait objects and get the generic kind `error`.
    #[must_use]
    pub fn capture<E: std::error::Error + 'static>(err: &E) -> Self {
        let full = std::any::type_name::<E>();
        let kind = full.rsplit("::").next().unwrap_or(full);
        let mut captured = Self::of_kind(kind, err.to_string());
        if let Some(source) = err.source() {
            captured.cause = Some(Arc::new(Self::capture_dyn(source)));
        }
        captured
    }

    fn capture_dyn(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut captured = Self::new(err.to_string());
        if let Some(source) = err.source() {
            captured.cause = Some(Arc::new(Self::capture_dyn(source)));
        }
        captured
    }

    /// The error's kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The error's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The directly wrapped cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&ErrorValue> {
        self.cause.as_deref()
    }

    /// Iterate over this error followed by each wrapped cause.
    pub fn chain(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }

    /// Whether `target` is structurally equal to any link of this chain.
    #[must_use]
    pub fn is(&self, target: &ErrorValue) -> bool {
        self.chain().any(|link| link == target)
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ErrorValue {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Iterator over an error chain, outermost first.
#[derive(Debug, Clone)]
pub struct Chain<'a> {
    next: Option<&'a ErrorValue>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a ErrorValue;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.cause();
        Some(current)
    }
}
