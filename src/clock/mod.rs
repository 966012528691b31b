//! Time sources for the polling engine
//!
//! The blocking driver sleeps through a [`Clock`]; the async driver awaits a
//! [`TimeSource`]. Both come in a real and a virtual flavour:
//!
//! - [`SystemClock`] - wall-clock time, sleeps wake early on cancellation
//! - [`MockClock`] - virtual time, sleeps advance instantly
//! - `TokioTime` - tokio-backed async sleeps (with the `tokio` feature)
//!
//! # Example
//!
//! ```rust
//! use testkit_poll::clock::MockClock;
//! use std::time::Duration;
//!
//! let clock = MockClock::new();
//! assert_eq!(clock.now(), Duration::ZERO);
//!
//! clock.advance(Duration::from_secs(10));
//! assert_eq!(clock.now(), Duration::from_secs(10));
//! ```

mod mock_clock;
mod system;
#[cfg(feature = "tokio")]
mod tokio;

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::poll::CancelToken;

pub use mock_clock::MockClock;
pub use system::SystemClock;
#[cfg(feature = "tokio")]
pub use self::tokio::TokioTime;

/// How a blocking sleep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The full duration passed.
    Elapsed,
    /// The cancel token fired first.
    Cancelled,
}

/// A blocking source of time.
pub trait Clock: Send + Sync + Debug {
    /// Time since the clock's epoch.
    fn now(&self) -> Duration;

    /// Block for `duration`, waking early if `cancel` fires.
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> Wake;
}

/// A source of time for async operations.
///
/// Cancellation is not part of this trait; the async driver races each
/// sleep against the cancel token itself.
pub trait TimeSource: Send + Sync {
    /// Get the current time as a duration since an epoch.
    fn now(&self) -> Duration;

    /// Create a future that completes after the given duration.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
