//! Wall-clock time.

use std::time::{Duration, Instant};

use super::{Clock, Wake};
use crate::poll::CancelToken;

/// Real time measured from the clock's creation.
///
/// Sleeps block the calling thread and wake early when the cancel token
/// fires.
///
/// # Example
///
/// ```rust
/// use testkit_poll::clock::{Clock, SystemClock, Wake};
/// use testkit_poll::poll::CancelToken;
/// use std::time::Duration;
///
/// let clock = SystemClock::new();
/// let token = CancelToken::new();
/// assert_eq!(clock.sleep(Duration::from_millis(1), &token), Wake::Elapsed);
/// assert!(clock.now() >= Duration::from_millis(1));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Create a clock whose epoch is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> Wake {
        if cancel.wait_timeout(duration) {
            Wake::Cancelled
        } else {
            Wake::Elapsed
        }
    }
}
