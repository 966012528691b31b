//! Blocking channel carrying [`Value`]s.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::poll::CancelToken;
use crate::value::{Kind, Value};

/// Longest single condvar wait while a cancel token is being watched.
const CANCEL_SLICE: Duration = Duration::from_millis(5);

/// Element type accepted by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemType {
    /// Any value may be sent.
    Any,
    /// Only values of this kind may be sent.
    Of(Kind),
}

impl ElemType {
    /// Whether `value` may be sent on a channel of this element type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Of(kind) => {
                value.kind() == kind || (matches!(value, Value::Nil) && kind.is_nillable())
            }
        }
    }

    /// Name used in type renderings.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Of(kind) => kind.name(),
        }
    }
}

impl From<Kind> for ElemType {
    fn from(kind: Kind) -> Self {
        Self::Of(kind)
    }
}

/// Which operations a handle permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Send and receive.
    Both,
    /// Send only.
    SendOnly,
    /// Receive only.
    RecvOnly,
}

impl Direction {
    /// Whether values may be sent through a handle with this direction.
    #[must_use]
    pub fn can_send(self) -> bool {
        matches!(self, Self::Both | Self::SendOnly)
    }

    /// Whether values may be received through a handle with this direction.
    #[must_use]
    pub fn can_recv(self) -> bool {
        matches!(self, Self::Both | Self::RecvOnly)
    }
}

/// Misuse of a channel handle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChanError {
    /// The handle is a nil channel.
    #[error("operation on a nil channel")]
    Nil,
    /// The handle's direction forbids the operation.
    #[error("{0}")]
    Direction(&'static str),
    /// The value does not fit the channel's element type.
    #[error("cannot use <{value}> as element of {channel}")]
    ElemType {
        /// Type of the offered value.
        value: String,
        /// Type of the channel.
        channel: String,
    },
    /// The channel was already closed.
    #[error("close of closed channel")]
    AlreadyClosed,
}

/// Error returned by send operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SendError {
    /// No room and no waiting receiver within the allowed wait.
    #[error("no receiver was ready")]
    Full(Value),
    /// The channel is closed; it will never accept a value again.
    #[error("sending on a closed channel")]
    Closed(Value),
    /// The handle cannot be used to send this value.
    #[error(transparent)]
    Invalid(ChanError),
}

/// Error returned by receive operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecvError {
    /// Nothing arrived within the allowed wait.
    #[error("channel is empty")]
    Empty,
    /// The channel is closed and drained.
    #[error("channel is disconnected")]
    Disconnected,
    /// The handle cannot be used to receive.
    #[error(transparent)]
    Invalid(ChanError),
}

/// Constructors for channels.
///
/// This struct is just a namespace; channels are used through
/// [`ChanHandle`].
///
/// # Example
///
/// ```rust
/// use testkit_poll::chan::{Chan, ElemType};
/// use testkit_poll::value::{Kind, Value};
///
/// let c = Chan::buffered(Kind::Str, 1);
/// c.try_send("foo").unwrap();
/// assert_eq!(c.try_recv().unwrap(), Value::from("foo"));
///
/// let any = Chan::unbuffered(ElemType::Any);
/// assert_eq!(any.capacity(), 0);
/// ```
pub struct Chan {
    _private: (),
}

impl Chan {
    /// Create an unbuffered channel: a send completes only when a receiver
    /// is waiting.
    pub fn unbuffered(elem: impl Into<ElemType>) -> ChanHandle {
        Self::buffered(elem, 0)
    }

    /// Create a channel buffering up to `capacity` values.
    pub fn buffered(elem: impl Into<ElemType>, capacity: usize) -> ChanHandle {
        ChanHandle {
            inner: Some(Arc::new(ChanInner {
                state: Mutex::new(ChanState {
                    queue: VecDeque::new(),
                    capacity,
                    closed: false,
                    waiting_receivers: 0,
                    parked: VecDeque::new(),
                    next_ticket: 0,
                }),
                readable: Condvar::new(),
                writable: Condvar::new(),
            })),
            dir: Direction::Both,
            elem: elem.into(),
        }
    }

    /// Create a nil channel handle.
    pub fn nil(elem: impl Into<ElemType>) -> ChanHandle {
        ChanHandle {
            inner: None,
            dir: Direction::Both,
            elem: elem.into(),
        }
    }
}

struct ChanInner {
    state: Mutex<ChanState>,
    /// Signalled when a value is queued or parked, or the channel closes.
    readable: Condvar,
    /// Signalled when room opens up, a receiver starts waiting or takes a
    /// parked value, or the channel closes.
    writable: Condvar,
}

/// A value offered by a sender that is blocked until a receiver takes it.
struct Parked {
    ticket: u64,
    value: Value,
}

struct ChanState {
    queue: VecDeque<Value>,
    capacity: usize,
    closed: bool,
    /// Receivers currently blocked; each one makes room for a hand-off.
    waiting_receivers: usize,
    /// Blocked senders in arrival order.
    parked: VecDeque<Parked>,
    next_ticket: u64,
}

impl ChanState {
    fn has_room(&self) -> bool {
        self.queue.len() < self.capacity + self.waiting_receivers
    }

    /// Take the next value: buffered values first, then a blocked sender's.
    ///
    /// Taking from a full buffer moves the oldest parked value into the
    /// freed slot. Parked values are never handed out once closed.
    fn take(&mut self) -> Option<Value> {
        let Some(value) = self.queue.pop_front() else {
            if self.closed {
                return None;
            }
            return self.parked.pop_front().map(|parked| parked.value);
        };
        if !self.closed && self.queue.len() < self.capacity {
            if let Some(parked) = self.parked.pop_front() {
                self.queue.push_back(parked.value);
            }
        }
        Some(value)
    }

    fn park(&mut self, value: Value) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.parked.push_back(Parked { ticket, value });
        ticket
    }

    fn is_parked(&self, ticket: u64) -> bool {
        self.parked.iter().any(|parked| parked.ticket == ticket)
    }

    /// Withdraw a parked value. `None` means a receiver already took it.
    fn unpark(&mut self, ticket: u64) -> Option<Value> {
        let index = self
            .parked
            .iter()
            .position(|parked| parked.ticket == ticket)?;
        self.parked.remove(index).map(|parked| parked.value)
    }
}

/// A handle to a channel, or a nil channel.
///
/// Handles are cheap to clone; clones share the channel. Dropping handles
/// never closes the channel.
#[derive(Clone)]
pub struct ChanHandle {
    inner: Option<Arc<ChanInner>>,
    dir: Direction,
    elem: ElemType,
}

impl ChanHandle {
    /// A send-only view of this channel.
    ///
    /// # Errors
    ///
    /// Fails if this handle is receive-only.
    pub fn send_only(&self) -> Result<ChanHandle, ChanError> {
        if !self.dir.can_send() {
            return Err(ChanError::Direction(
                "cannot narrow a receive-only channel to send-only",
            ));
        }
        Ok(Self {
            dir: Direction::SendOnly,
            ..self.clone()
        })
    }

    /// A receive-only view of this channel.
    ///
    /// # Errors
    ///
    /// Fails if this handle is send-only.
    pub fn recv_only(&self) -> Result<ChanHandle, ChanError> {
        if !self.dir.can_recv() {
            return Err(ChanError::Direction(
                "cannot narrow a send-only channel to receive-only",
            ));
        }
        Ok(Self {
            dir: Direction::RecvOnly,
            ..self.clone()
        })
    }

    /// The handle's direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.dir
    }

    /// The channel's element type.
    #[must_use]
    pub fn elem_type(&self) -> ElemType {
        self.elem
    }

    /// Whether this is a nil channel.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether both handles refer to the same channel.
    #[must_use]
    pub fn same_channel(&self, other: &ChanHandle) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Whether the channel has been closed.
    ///
    /// This only inspects state; buffered values stay in place.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.state.lock().closed)
    }

    /// Number of buffered values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.state.lock().queue.len())
    }

    /// Whether no value is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer capacity (0 for unbuffered and nil channels).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.state.lock().capacity)
    }

    /// Type rendering, e.g. `chan string` or `<-chan int`.
    #[must_use]
    pub fn type_name(&self) -> String {
        let prefix = match self.dir {
            Direction::Both => "chan",
            Direction::SendOnly => "chan<-",
            Direction::RecvOnly => "<-chan",
        };
        format!("{prefix} {}", self.elem.name())
    }

    /// Human readable state, used when rendering failure messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.inner {
            None => "nil".to_string(),
            Some(inner) => {
                let state = inner.state.lock();
                format!(
                    "len={} cap={} {}",
                    state.queue.len(),
                    state.capacity,
                    if state.closed { "closed" } else { "open" }
                )
            }
        }
    }

    /// Close the channel.
    ///
    /// Buffered values remain receivable.
    ///
    /// # Errors
    ///
    /// Fails on nil channels, receive-only handles, and channels that are
    /// already closed.
    pub fn close(&self) -> Result<(), ChanError> {
        let inner = self.inner.as_ref().ok_or(ChanError::Nil)?;
        if !self.dir.can_send() {
            return Err(ChanError::Direction("cannot close a receive-only channel"));
        }
        let mut state = inner.state.lock();
        if state.closed {
            return Err(ChanError::AlreadyClosed);
        }
        state.closed = true;
        tracing::debug!(buffered = state.queue.len(), "channel closed");
        inner.readable.notify_all();
        inner.writable.notify_all();
        Ok(())
    }

    /// Send a value, blocking until it is buffered, taken by a receiver, or
    /// the channel closes.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Closed`] if the channel is closed and
    /// [`SendError::Invalid`] if the handle cannot send this value.
    pub fn send(&self, value: impl Into<Value>) -> Result<(), SendError> {
        self.send_until(value.into(), None, None)
    }

    /// Send a value only if it can be accepted right now.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Full`] if there is no room and no receiver is
    /// waiting.
    pub fn try_send(&self, value: impl Into<Value>) -> Result<(), SendError> {
        self.send_until(value.into(), Some(Instant::now()), None)
    }

    /// Send a value, waiting at most `wait` for room or a receiver.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Full`] if the wait elapsed.
    pub fn send_timeout(&self, value: impl Into<Value>, wait: Duration) -> Result<(), SendError> {
        self.send_until(value.into(), Instant::now().checked_add(wait), None)
    }

    /// Receive a value, blocking until one arrives or the channel closes.
    ///
    /// # Errors
    ///
    /// Returns [`RecvError::Disconnected`] once closed and drained.
    pub fn recv(&self) -> Result<Value, RecvError> {
        self.recv_until(None, None)
    }

    /// Receive a value only if one is ready right now: buffered, or offered
    /// by a sender blocked in [`send`](Self::send).
    ///
    /// # Errors
    ///
    /// Returns [`RecvError::Empty`] if nothing is buffered and no sender is
    /// blocked.
    pub fn try_recv(&self) -> Result<Value, RecvError> {
        self.recv_until(Some(Instant::now()), None)
    }

    /// Receive a value, waiting at most `wait`.
    ///
    /// # Errors
    ///
    /// Returns [`RecvError::Empty`] if the wait elapsed.
    pub fn recv_timeout(&self, wait: Duration) -> Result<Value, RecvError> {
        self.recv_until(Instant::now().checked_add(wait), None)
    }

    /// Cancel-aware bounded send used by matchers.
    pub(crate) fn send_within(
        &self,
        value: Value,
        wait: Duration,
        cancel: &CancelToken,
    ) -> Result<(), SendError> {
        self.send_until(value, Instant::now().checked_add(wait), Some(cancel))
    }

    /// Cancel-aware bounded receive used by matchers.
    pub(crate) fn recv_within(
        &self,
        wait: Duration,
        cancel: &CancelToken,
    ) -> Result<Value, RecvError> {
        self.recv_until(Instant::now().checked_add(wait), Some(cancel))
    }

    fn sendable(&self, value: &Value) -> Result<&ChanInner, ChanError> {
        let inner = self.inner.as_deref().ok_or(ChanError::Nil)?;
        if !self.dir.can_send() {
            return Err(ChanError::Direction("cannot send on a receive-only channel"));
        }
        if !self.elem.accepts(value) {
            return Err(ChanError::ElemType {
                value: value.type_name(),
                channel: self.type_name(),
            });
        }
        Ok(inner)
    }

    fn receivable(&self) -> Result<&ChanInner, ChanError> {
        let inner = self.inner.as_deref().ok_or(ChanError::Nil)?;
        if !self.dir.can_recv() {
            return Err(ChanError::Direction(
                "cannot receive from a send-only channel",
            ));
        }
        Ok(inner)
    }

    fn send_until(
        &self,
        value: Value,
        deadline: Option<Instant>,
        cancel: Option<&CancelToken>,
    ) -> Result<(), SendError> {
        let inner = self.sendable(&value).map_err(SendError::Invalid)?;
        let mut state = inner.state.lock();
        if state.closed {
            return Err(SendError::Closed(value));
        }
        if state.has_room() {
            state.queue.push_back(value);
            inner.readable.notify_all();
            return Ok(());
        }
        if deadline.is_some_and(|d| d <= Instant::now())
            || cancel.is_some_and(CancelToken::is_cancelled)
        {
            return Err(SendError::Full(value));
        }

        let ticket = state.park(value);
        inner.readable.notify_all();
        loop {
            let keep_waiting = wait_for_change(&inner.writable, &mut state, deadline, cancel);
            if keep_waiting && !state.closed && state.is_parked(ticket) {
                continue;
            }
            let closed = state.closed;
            return match state.unpark(ticket) {
                None => Ok(()),
                Some(value) if closed => Err(SendError::Closed(value)),
                Some(value) => Err(SendError::Full(value)),
            };
        }
    }

    fn recv_until(
        &self,
        deadline: Option<Instant>,
        cancel: Option<&CancelToken>,
    ) -> Result<Value, RecvError> {
        let inner = self.receivable().map_err(RecvError::Invalid)?;
        let mut state = inner.state.lock();
        if let Some(value) = state.take() {
            inner.writable.notify_all();
            return Ok(value);
        }
        if state.closed {
            return Err(RecvError::Disconnected);
        }
        if deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(RecvError::Empty);
        }

        state.waiting_receivers += 1;
        inner.writable.notify_all();
        let outcome = loop {
            let keep_waiting = wait_for_change(&inner.readable, &mut state, deadline, cancel);
            if let Some(value) = state.take() {
                break Ok(value);
            }
            if state.closed {
                break Err(RecvError::Disconnected);
            }
            if !keep_waiting {
                break Err(RecvError::Empty);
            }
        };
        state.waiting_receivers -= 1;
        inner.writable.notify_all();
        outcome
    }
}

/// Block on `condvar` once. Returns `false` when the deadline has passed or
/// the cancel token fired, meaning the caller should give up.
fn wait_for_change(
    condvar: &Condvar,
    state: &mut MutexGuard<'_, ChanState>,
    deadline: Option<Instant>,
    cancel: Option<&CancelToken>,
) -> bool {
    if cancel.is_some_and(CancelToken::is_cancelled) {
        return false;
    }
    let now = Instant::now();
    let mut slice = match deadline {
        Some(deadline) if deadline <= now => return false,
        Some(deadline) => Some(deadline - now),
        None => None,
    };
    if cancel.is_some() {
        slice = Some(slice.map_or(CANCEL_SLICE, |s| s.min(CANCEL_SLICE)));
    }
    match slice {
        Some(slice) => {
            condvar.wait_for(state, slice);
        }
        None => condvar.wait(state),
    }
    true
}

impl fmt::Debug for ChanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChanHandle")
            .field("type", &self.type_name())
            .field("state", &self.describe())
            .finish()
    }
}
