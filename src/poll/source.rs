//! Actual-value sources.

use std::fmt;

use super::CancelToken;
use crate::error::Result;
use crate::value::Value;

type Producer<'a> = Box<dyn FnMut(&CancelToken) -> Result<Value> + 'a>;

/// Where a polled assertion gets its actual value from.
///
/// A fixed source hands out the same captured value on every attempt; a
/// function source is re-invoked on every attempt. The engine borrows the
/// source for the duration of one assertion call and drops it afterwards.
///
/// # Example
///
/// ```rust
/// use testkit_poll::poll::{CancelToken, Source};
/// use testkit_poll::value::Value;
///
/// let mut calls = 0;
/// let mut source = Source::func(|| {
///     calls += 1;
///     calls
/// });
///
/// let cancel = CancelToken::new();
/// assert_eq!(source.produce(&cancel).unwrap(), Value::from(1));
/// assert_eq!(source.produce(&cancel).unwrap(), Value::from(2));
/// ```
pub struct Source<'a> {
    kind: SourceKind<'a>,
}

enum SourceKind<'a> {
    Fixed(Value),
    Func(Producer<'a>),
}

impl<'a> Source<'a> {
    /// A value captured once.
    pub fn fixed(value: impl Into<Value>) -> Self {
        Self {
            kind: SourceKind::Fixed(value.into()),
        }
    }

    /// A function re-invoked on every attempt.
    pub fn func<F, V>(mut f: F) -> Self
    where
        F: FnMut() -> V + 'a,
        V: Into<Value>,
    {
        Self::boxed(Box::new(move |_| Ok(f().into())))
    }

    /// A fallible function re-invoked on every attempt.
    ///
    /// Returning [`Error::NotReady`](crate::Error::NotReady) asks the engine
    /// to try again; any other error ends polling.
    pub fn try_func<F, V>(mut f: F) -> Self
    where
        F: FnMut() -> Result<V> + 'a,
        V: Into<Value>,
    {
        Self::boxed(Box::new(move |_| f().map(Into::into)))
    }

    /// A function that receives the assertion's cancellation token.
    pub fn with_cancel<F, V>(mut f: F) -> Self
    where
        F: FnMut(&CancelToken) -> V + 'a,
        V: Into<Value>,
    {
        Self::boxed(Box::new(move |cancel| Ok(f(cancel).into())))
    }

    fn boxed(producer: Producer<'a>) -> Self {
        Self {
            kind: SourceKind::Func(producer),
        }
    }

    /// Whether this source is a captured value rather than a function.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self.kind, SourceKind::Fixed(_))
    }

    /// Produce the actual value for one attempt.
    ///
    /// # Errors
    ///
    /// Propagates the function's error for fallible sources.
    pub fn produce(&mut self, cancel: &CancelToken) -> Result<Value> {
        match &mut self.kind {
            SourceKind::Fixed(value) => Ok(value.clone()),
            SourceKind::Func(f) => f(cancel),
        }
    }
}

impl fmt::Debug for Source<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SourceKind::Fixed(value) => f.debug_tuple("Source::Fixed").field(value).finish(),
            SourceKind::Func(_) => f.write_str("Source::Func"),
        }
    }
}

impl From<Value> for Source<'_> {
    fn from(value: Value) -> Self {
        Self::fixed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_fixed_source_repeats() {
        let mut source = Source::fixed("foo");
        let cancel = CancelToken::new();
        assert!(source.is_fixed());
        assert_eq!(source.produce(&cancel).unwrap(), Value::from("foo"));
        assert_eq!(source.produce(&cancel).unwrap(), Value::from("foo"));
    }

    #[test]
    fn test_try_func_propagates_errors() {
        let mut source = Source::try_func(|| -> Result<i32> { Err(Error::not_ready("warming")) });
        let err = source.produce(&CancelToken::new()).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_with_cancel_sees_token() {
        let mut source = Source::with_cancel(|cancel: &CancelToken| cancel.is_cancelled());
        let cancel = CancelToken::new();
        assert_eq!(source.produce(&cancel).unwrap(), Value::Bool(false));
        cancel.cancel();
        assert_eq!(source.produce(&cancel).unwrap(), Value::Bool(true));
    }
}
