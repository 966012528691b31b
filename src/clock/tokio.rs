//! Tokio runtime integration.
//!
//! Provides [`TokioTime`], a real-time [`TimeSource`] for the async driver.
//!
//! # Example
//!
//! ```rust,ignore
//! use testkit_poll::clock::TokioTime;
//! use testkit_poll::{eventually_fn, matcher::equal};
//!
//! #[tokio::test]
//! async fn test_async_poll() {
//!     eventually_fn(|| 1)
//!         .with_time_source(TokioTime::new())
//!         .should_async(equal(1))
//!         .await;
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::TimeSource;

/// Tokio-based time source using real time.
///
/// This is a thin wrapper around Tokio's time functions.
#[derive(Debug, Clone)]
pub struct TokioTime {
    /// Offset from the start time.
    start: std::time::Instant,
}

impl TokioTime {
    /// Create a new Tokio time source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Default for TokioTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for TokioTime {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(::tokio::time::sleep(duration))
    }
}
