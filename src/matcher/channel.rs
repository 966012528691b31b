//! Channel matchers.
//!
//! These are the only matchers whose evaluation may wait. A wait is one
//! bounded attempt, clamped to the enclosing poll budget and woken by its
//! cancellation token; the polling engine supplies the retries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::{EvalContext, Matcher};
use crate::chan::{ChanError, ChanHandle, RecvError, SendError};
use crate::error::{Error, Result};
use crate::value::{format, Value};

fn channel_of<'a>(actual: &'a Value, matcher: &'static str) -> Result<&'a ChanHandle> {
    let handle = actual.as_chan().ok_or_else(|| {
        Error::type_mismatch(matcher, "a channel", format::object(actual, 1))
    })?;
    if handle.is_nil() {
        return Err(Error::unsupported(matcher, format::object(actual, 1)));
    }
    Ok(handle)
}

fn receivable<'a>(actual: &'a Value, matcher: &'static str) -> Result<&'a ChanHandle> {
    let handle = channel_of(actual, matcher)?;
    if !handle.direction().can_recv() {
        return Err(Error::type_mismatch(
            matcher,
            "a channel that can be received from",
            format::object(actual, 1),
        ));
    }
    Ok(handle)
}

fn chan_error(matcher: &'static str, actual: &Value, err: &ChanError) -> Error {
    match err {
        ChanError::ElemType { value, channel } => Error::type_mismatch(
            matcher,
            format!("a value assignable to {channel}"),
            format!("    <{value}>"),
        ),
        _ => Error::type_mismatch(matcher, err.to_string(), format::object(actual, 1)),
    }
}

/// Succeeds when the channel is closed.
///
/// The check never receives, so buffered values stay in place. Send-only
/// handles, nil channels and non-channels are errors.
///
/// ```rust
/// use testkit_poll::chan::Chan;
/// use testkit_poll::matcher::{be_closed, Matcher};
/// use testkit_poll::value::{Kind, Value};
///
/// let c = Chan::buffered(Kind::Int, 1);
/// c.try_send(1).unwrap();
/// c.close().unwrap();
///
/// assert!(be_closed().evaluate(&Value::from(&c)).unwrap());
/// assert_eq!(c.recv().unwrap(), Value::from(1));
/// ```
pub fn be_closed() -> BeClosed {
    BeClosed
}

/// Matcher returned by [`be_closed`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BeClosed;

impl Matcher for BeClosed {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        Ok(receivable(actual, "BeClosed")?.is_closed())
    }

    fn failure_message(&self, actual: &Value) -> String {
        format::message_verb(actual, "to be closed")
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format::message_verb(actual, "to be open")
    }

    fn may_change(&self, actual: &Value) -> bool {
        !actual.as_chan().is_some_and(ChanHandle::is_closed)
    }
}

/// Attempts to deliver `value` into the channel.
///
/// Each evaluation makes one send attempt. By default the attempt does not
/// wait; [`BeSent::within`] lets it wait for a receiver. A closed channel is
/// an error, which ends polling at once. A value the channel's element type
/// rejects, receive-only handles, nil channels and non-channels are errors.
///
/// ```rust
/// use testkit_poll::chan::Chan;
/// use testkit_poll::matcher::{be_sent, Matcher};
/// use testkit_poll::value::{Kind, Value};
///
/// let c = Chan::buffered(Kind::Int, 1);
/// let m = be_sent(7);
/// assert!(m.evaluate(&Value::from(&c)).unwrap());
/// assert!(m.performed_side_effect());
///
/// // The buffer is full now
/// assert!(!m.evaluate(&Value::from(&c)).unwrap());
/// assert_eq!(c.try_recv().unwrap(), Value::from(7));
/// ```
pub fn be_sent(value: impl Into<Value>) -> BeSent {
    BeSent {
        value: value.into(),
        window: Duration::ZERO,
        delivered: AtomicBool::new(false),
    }
}

/// Matcher returned by [`be_sent`].
#[derive(Debug)]
pub struct BeSent {
    value: Value,
    window: Duration,
    delivered: AtomicBool,
}

impl BeSent {
    /// Wait up to `window` for a receiver on each attempt.
    #[must_use]
    pub fn within(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

impl Matcher for BeSent {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        self.evaluate_in(actual, &EvalContext::default())
    }

    fn evaluate_in(&self, actual: &Value, cx: &EvalContext) -> Result<bool> {
        self.delivered.store(false, Ordering::SeqCst);
        let handle = channel_of(actual, "BeSent")?;
        if !handle.direction().can_send() {
            return Err(Error::type_mismatch(
                "BeSent",
                "a channel that can be sent to",
                format::object(actual, 1),
            ));
        }
        if handle.is_closed() {
            return Err(Error::closed(
                "BeSent expects the channel to be open, but it is closed",
            ));
        }
        match handle.send_within(self.value.clone(), cx.bound(self.window), cx.cancel()) {
            Ok(()) => {
                self.delivered.store(true, Ordering::SeqCst);
                Ok(true)
            }
            Err(SendError::Full(_)) => Ok(false),
            Err(SendError::Closed(_)) => Err(Error::closed(
                "BeSent expects the channel to be open, but it was closed while sending",
            )),
            Err(SendError::Invalid(err)) => Err(chan_error("BeSent", actual, &err)),
        }
    }

    fn failure_message(&self, actual: &Value) -> String {
        format::message(actual, "to send", &self.value)
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        format::message(actual, "not to send", &self.value)
    }

    fn may_change(&self, actual: &Value) -> bool {
        !actual.as_chan().is_some_and(ChanHandle::is_closed)
    }

    fn performed_side_effect(&self) -> bool {
        self.delivered.load(Ordering::SeqCst)
    }
}

/// Succeeds when a value can be received from the channel.
///
/// Each evaluation makes one receive attempt and consumes what it receives.
/// A closed, drained channel is a mismatch that can never change.
pub fn receive() -> Receive {
    Receive {
        inner: None,
        window: Duration::ZERO,
        last: Mutex::new(Received::Nothing),
    }
}

/// Succeeds when a value is received and `inner` matches it.
///
/// Errors from `inner` propagate unchanged.
///
/// ```rust
/// use testkit_poll::chan::{Chan, ElemType};
/// use testkit_poll::matcher::{equal, receive_matching, Matcher};
/// use testkit_poll::value::Value;
///
/// let c = Chan::buffered(ElemType::Any, 2);
/// c.try_send("foo").unwrap();
/// c.try_send("bar").unwrap();
///
/// let m = receive_matching(equal("bar"));
/// assert!(!m.evaluate(&Value::from(&c)).unwrap());
/// assert!(m.evaluate(&Value::from(&c)).unwrap());
/// ```
pub fn receive_matching(inner: impl Matcher + 'static) -> Receive {
    Receive {
        inner: Some(Box::new(inner)),
        ..receive()
    }
}

#[derive(Debug, Clone)]
enum Received {
    Nothing,
    Closed,
    Value(Value),
}

/// Matcher returned by [`receive`] and [`receive_matching`].
pub struct Receive {
    inner: Option<Box<dyn Matcher>>,
    window: Duration,
    last: Mutex<Received>,
}

impl std::fmt::Debug for Receive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receive")
            .field("nested", &self.inner.is_some())
            .field("window", &self.window)
            .field("last", &*self.last.lock())
            .finish()
    }
}

impl Receive {
    /// Wait up to `window` for a value on each attempt.
    #[must_use]
    pub fn within(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

impl Matcher for Receive {
    fn evaluate(&self, actual: &Value) -> Result<bool> {
        self.evaluate_in(actual, &EvalContext::default())
    }

    fn evaluate_in(&self, actual: &Value, cx: &EvalContext) -> Result<bool> {
        *self.last.lock() = Received::Nothing;
        let handle = receivable(actual, "Receive")?;
        match handle.recv_within(cx.bound(self.window), cx.cancel()) {
            Ok(value) => {
                *self.last.lock() = Received::Value(value.clone());
                match &self.inner {
                    Some(inner) => inner.evaluate_in(&value, cx),
                    None => Ok(true),
                }
            }
            Err(RecvError::Empty) => Ok(false),
            Err(RecvError::Disconnected) => {
                *self.last.lock() = Received::Closed;
                Ok(false)
            }
            Err(RecvError::Invalid(err)) => Err(chan_error("Receive", actual, &err)),
        }
    }

    fn failure_message(&self, actual: &Value) -> String {
        let last = self.last.lock().clone();
        match (&self.inner, last) {
            (Some(inner), Received::Value(value)) => format!(
                "Expected\n{}\nto receive something matching\n{}",
                format::object(actual, 1),
                format::indent_lines(&inner.failure_message(&value), 1)
            ),
            (_, Received::Closed) => format::message_verb(
                actual,
                "to receive something, but it is closed and drained",
            ),
            _ => format::message_verb(actual, "to receive something"),
        }
    }

    fn negated_failure_message(&self, actual: &Value) -> String {
        let last = self.last.lock().clone();
        match (&self.inner, last) {
            (Some(inner), Received::Value(value)) => format!(
                "Expected\n{}\nnot to receive anything matching\n{}",
                format::object(actual, 1),
                format::indent_lines(&inner.negated_failure_message(&value), 1)
            ),
            (None, Received::Value(value)) => format!(
                "Expected\n{}\nnot to receive anything, but got\n{}",
                format::object(actual, 1),
                format::object(&value, 1)
            ),
            _ => format::message_verb(actual, "not to receive anything"),
        }
    }

    fn may_change(&self, actual: &Value) -> bool {
        !matches!(*self.last.lock(), Received::Closed)
            && !actual
                .as_chan()
                .is_some_and(|handle| handle.is_closed() && handle.is_empty())
    }

    fn performed_side_effect(&self) -> bool {
        matches!(*self.last.lock(), Received::Value(_))
    }
}
