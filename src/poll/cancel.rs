//! Cooperative cancellation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A clonable cancellation signal.
///
/// Cancelling is one-way and idempotent. Blocking waiters are woken through a
/// condvar and async waiters through their wakers, so the same token serves
/// the blocking and async polling drivers.
///
/// # Example
///
/// ```rust
/// use testkit_poll::poll::CancelToken;
/// use std::time::Duration;
///
/// let token = CancelToken::new();
/// let clone = token.clone();
///
/// assert!(!token.wait_timeout(Duration::from_millis(1)));
/// clone.cancel();
/// assert!(token.is_cancelled());
/// assert!(token.wait_timeout(Duration::from_secs(60)));
/// ```
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    state: Mutex<CancelState>,
    condvar: Condvar,
}

#[derive(Default)]
struct CancelState {
    cancelled: bool,
    wakers: Vec<Waker>,
}

impl CancelToken {
    /// Create a token that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token, waking every waiter.
    pub fn cancel(&self) {
        let wakers = {
            let mut state = self.inner.state.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            self.inner.condvar.notify_all();
            std::mem::take(&mut state.wakers)
        };
        for waker in wakers {
            waker.wake();
        }
    }

    /// Whether the token has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancelled
    }

    /// Block for up to `timeout`. Returns `true` if the token fired.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.inner.state.lock();
        while !state.cancelled {
            match deadline {
                Some(deadline) => {
                    if self.inner.condvar.wait_until(&mut state, deadline).timed_out() {
                        return state.cancelled;
                    }
                }
                None => self.inner.condvar.wait(&mut state),
            }
        }
        true
    }

    /// A future that resolves once the token fires.
    #[must_use]
    pub fn cancelled(&self) -> Cancelled<'_> {
        Cancelled { token: self }
    }

    /// Fire the token after `delay` on a background thread.
    pub fn cancel_after(&self, delay: Duration) -> thread::JoinHandle<()> {
        let token = self.clone();
        thread::spawn(move || {
            if !token.wait_timeout(delay) {
                token.cancel();
            }
        })
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Future returned by [`CancelToken::cancelled`].
#[derive(Debug)]
pub struct Cancelled<'a> {
    token: &'a CancelToken,
}

impl Future for Cancelled<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.token.inner.state.lock();
        if state.cancelled {
            return Poll::Ready(());
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_wait_timeout_elapses() {
        let token = CancelToken::new();
        let started = Instant::now();
        assert!(!token.wait_timeout(Duration::from_millis(10)));
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_cancel_after_wakes_waiter() {
        let token = CancelToken::new();
        let handle = token.cancel_after(Duration::from_millis(10));
        assert!(token.wait_timeout(Duration::from_secs(10)));
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_future() {
        let token = CancelToken::new();
        let trigger = token.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });

        token.cancelled().await;
        assert!(token.is_cancelled());
        handle.await.unwrap();
    }

    #[test]
    fn test_cancelled_future_ready_when_already_fired() {
        let token = CancelToken::new();
        token.cancel();
        futures::executor::block_on(token.cancelled());
    }
}
