//! `MockClock` implementation for virtual time control.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use super::{Clock, TimeSource, Wake};
use crate::poll::CancelToken;

/// A mock clock that provides virtual time for polling assertions.
///
/// Sleeping on a `MockClock` never blocks: the clock jumps forward by the
/// requested duration and records the sleep. Polling assertions driven by a
/// `MockClock` therefore finish instantly while still walking through the
/// exact schedule a real clock would produce.
///
/// # Thread Safety
///
/// `MockClock` is thread-safe and can be cloned and shared across threads.
/// All clones share the same underlying time state.
///
/// # Example
///
/// ```rust
/// use testkit_poll::clock::MockClock;
/// use std::time::Duration;
///
/// // Create a new clock starting at time zero
/// let clock = MockClock::new();
/// assert_eq!(clock.now(), Duration::ZERO);
///
/// // Advance time by 10 seconds
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now(), Duration::from_secs(10));
///
/// // Clone shares the same time
/// let clock2 = clock.clone();
/// clock2.advance(Duration::from_secs(5));
/// assert_eq!(clock.now(), Duration::from_secs(15));
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    inner: Arc<Mutex<ClockState>>,
}

#[derive(Debug)]
struct ClockState {
    /// Current time as duration since clock creation
    current_time: Duration,
    /// Every sleep requested through the clock, in order
    sleeps: Vec<Duration>,
    /// Cancellations scheduled at virtual deadlines
    cancels: BinaryHeap<ScheduledCancel>,
    /// Counter for ordering cancels with equal deadlines
    next_id: u64,
}

#[derive(Debug)]
struct ScheduledCancel {
    deadline: Duration,
    id: u64,
    token: CancelToken,
}

impl PartialEq for ScheduledCancel {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl Eq for ScheduledCancel {}

impl PartialOrd for ScheduledCancel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledCancel {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap behavior (earliest deadline first)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    /// Creates a new `MockClock` starting at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::with_start_time(Duration::ZERO)
    }

    /// Creates a new `MockClock` starting at the specified time.
    ///
    /// # Example
    ///
    /// ```rust
    /// use testkit_poll::clock::MockClock;
    /// use std::time::Duration;
    ///
    /// let clock = MockClock::with_start_time(Duration::from_secs(100));
    /// assert_eq!(clock.now(), Duration::from_secs(100));
    /// ```
    #[must_use]
    pub fn with_start_time(start: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClockState {
                current_time: start,
                sleeps: Vec::new(),
                cancels: BinaryHeap::new(),
                next_id: 0,
            })),
        }
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.lock().current_time
    }

    /// Advances the clock by the specified duration.
    ///
    /// Cancellations scheduled with [`MockClock::cancel_at`] whose deadline
    /// falls inside the advanced span fire.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock();
        let target = state.current_time + duration;
        fire_cancels(&mut state, target, None);
        state.current_time = target;
    }

    /// Cancel `token` once virtual time reaches `deadline`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use testkit_poll::clock::MockClock;
    /// use testkit_poll::poll::CancelToken;
    /// use std::time::Duration;
    ///
    /// let clock = MockClock::new();
    /// let token = CancelToken::new();
    /// clock.cancel_at(Duration::from_millis(50), &token);
    ///
    /// clock.advance(Duration::from_millis(49));
    /// assert!(!token.is_cancelled());
    /// clock.advance(Duration::from_millis(1));
    /// assert!(token.is_cancelled());
    /// ```
    pub fn cancel_at(&self, deadline: Duration, token: &CancelToken) {
        let mut state = self.inner.lock();
        if deadline <= state.current_time {
            token.cancel();
            return;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.cancels.push(ScheduledCancel {
            deadline,
            id,
            token: token.clone(),
        });
    }

    /// Every sleep requested so far, in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().sleeps.clone()
    }

    /// Number of sleeps requested so far.
    #[must_use]
    pub fn sleep_count(&self) -> usize {
        self.inner.lock().sleeps.len()
    }
}

/// Fire every scheduled cancel up to `target`, moving time to each deadline.
///
/// Stops early and returns `true` as soon as `watch` is cancelled, leaving
/// time at that deadline.
fn fire_cancels(state: &mut ClockState, target: Duration, watch: Option<&CancelToken>) -> bool {
    while state
        .cancels
        .peek()
        .is_some_and(|entry| entry.deadline <= target)
    {
        if let Some(entry) = state.cancels.pop() {
            state.current_time = state.current_time.max(entry.deadline);
            entry.token.cancel();
        }
        if watch.is_some_and(CancelToken::is_cancelled) {
            return true;
        }
    }
    false
}

impl Clock for MockClock {
    fn now(&self) -> Duration {
        MockClock::now(self)
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> Wake {
        if cancel.is_cancelled() {
            return Wake::Cancelled;
        }
        let mut state = self.inner.lock();
        state.sleeps.push(duration);
        let target = state.current_time + duration;
        if fire_cancels(&mut state, target, Some(cancel)) {
            return Wake::Cancelled;
        }
        state.current_time = target;
        Wake::Elapsed
    }
}

impl TimeSource for MockClock {
    fn now(&self) -> Duration {
        MockClock::now(self)
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let mut state = self.inner.lock();
        state.sleeps.push(duration);
        let target = state.current_time + duration;
        fire_cancels(&mut state, target, None);
        state.current_time = target;
        Box::pin(std::future::ready(()))
    }
}
