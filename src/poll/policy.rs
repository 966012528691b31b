//! Timing policy for polled assertions.

use std::time::Duration;

use super::Strategy;
use crate::config;
use crate::error::{Error, Result};

/// Timeout, interval and repeat requirements for one polled assertion.
///
/// A `timeout` of `None` means "poll until cancelled" and is only valid for
/// `Eventually` with a cancellation token attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingPolicy {
    /// Total budget (`Eventually`) or observation window (`Consistently`).
    pub timeout: Option<Duration>,
    /// Delay between attempts.
    pub interval: Duration,
    /// Consecutive desired verdicts needed before `Eventually` succeeds.
    pub must_pass_repeatedly: usize,
}

impl PollingPolicy {
    /// A policy with the given timeout and interval.
    #[must_use]
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            interval,
            must_pass_repeatedly: 1,
        }
    }

    /// The process-wide default policy for `strategy`.
    #[must_use]
    pub fn defaults_for(strategy: Strategy) -> Self {
        let defaults = config::defaults();
        match strategy {
            Strategy::Eventually => {
                Self::new(defaults.eventually_timeout, defaults.eventually_interval)
            }
            Strategy::Consistently => {
                Self::new(defaults.consistently_duration, defaults.consistently_interval)
            }
        }
    }

    /// Check the policy can be honoured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPolicy`] for a zero timeout or interval, a zero
    /// repeat count, a repeat count on `Consistently`, or an unbounded
    /// timeout that nothing could ever stop.
    pub fn validate(&self, strategy: Strategy, has_cancel: bool) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::invalid_policy("polling interval must be greater than zero"));
        }
        if self.must_pass_repeatedly == 0 {
            return Err(Error::invalid_policy("must_pass_repeatedly must be at least 1"));
        }
        if strategy == Strategy::Consistently && self.must_pass_repeatedly != 1 {
            return Err(Error::invalid_policy(
                "must_pass_repeatedly is only supported by eventually",
            ));
        }
        match self.timeout {
            Some(timeout) if timeout.is_zero() => {
                Err(Error::invalid_policy("timeout must be greater than zero"))
            }
            Some(_) => Ok(()),
            None if strategy == Strategy::Consistently => Err(Error::invalid_policy(
                "consistently needs a finite duration",
            )),
            None if !has_cancel => Err(Error::invalid_policy(
                "an unbounded timeout requires a cancellation token",
            )),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_valid_policy() {
        let policy = PollingPolicy::new(ms(100), ms(10));
        assert!(policy.validate(Strategy::Eventually, false).is_ok());
        assert!(policy.validate(Strategy::Consistently, false).is_ok());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let err = PollingPolicy::new(ms(0), ms(10))
            .validate(Strategy::Eventually, false)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPolicy(_)));

        let err = PollingPolicy::new(ms(10), ms(0))
            .validate(Strategy::Eventually, false)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPolicy(_)));
    }

    #[test]
    fn test_unbounded_timeout_needs_cancel() {
        let policy = PollingPolicy {
            timeout: None,
            interval: ms(10),
            must_pass_repeatedly: 1,
        };
        assert!(policy.validate(Strategy::Eventually, false).is_err());
        assert!(policy.validate(Strategy::Eventually, true).is_ok());
        assert!(policy.validate(Strategy::Consistently, true).is_err());
    }

    #[test]
    fn test_repeat_count_rules() {
        let mut policy = PollingPolicy::new(ms(100), ms(10));
        policy.must_pass_repeatedly = 0;
        assert!(policy.validate(Strategy::Eventually, false).is_err());

        policy.must_pass_repeatedly = 3;
        assert!(policy.validate(Strategy::Eventually, false).is_ok());
        assert!(policy.validate(Strategy::Consistently, false).is_err());
    }
}
