//! The polling state machine.
//!
//! [`Poller`] knows nothing about clocks, threads or futures. A driver feeds
//! it one [`Observation`] per attempt together with the current time, and
//! the poller answers with the next [`Step`]. The blocking and async drivers
//! share it, so both follow exactly the same rules.

use std::fmt;
use std::time::Duration;

use super::PollingPolicy;
use crate::error::Error;
use crate::matcher::Matcher;
use crate::value::Value;

/// Which terminal condition a polled assertion is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Succeed as soon as the desired verdict is observed.
    Eventually,
    /// Fail as soon as the desired verdict is not observed.
    Consistently,
}

impl Strategy {
    /// Lowercase name used in log events.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Eventually => "eventually",
            Self::Consistently => "consistently",
        }
    }
}

/// Whether the matcher is expected to succeed or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// `should`: the matcher must succeed.
    Affirm,
    /// `should_not`: the matcher must fail.
    Negate,
}

impl Mode {
    /// Whether a raw matcher result is the one this mode wants.
    #[must_use]
    pub fn desired(self, matched: bool) -> bool {
        match self {
            Self::Affirm => matched,
            Self::Negate => !matched,
        }
    }

    /// The matcher's explanation for an undesired result in this mode.
    #[must_use]
    pub fn explain(self, matcher: &dyn Matcher, actual: &Value) -> String {
        match self {
            Self::Affirm => matcher.failure_message(actual),
            Self::Negate => matcher.negated_failure_message(actual),
        }
    }
}

/// Lifecycle of a polled assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollState {
    /// Created but not yet attempted.
    Initializing,
    /// At least one attempt made, no verdict yet.
    Polling,
    /// The desired condition held.
    Succeeded,
    /// The desired condition did not hold in time.
    Failed,
    /// The source or matcher returned a terminal error.
    Errored,
    /// The cancellation token fired.
    Cancelled,
}

impl PollState {
    /// Whether no further attempts will be made.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Initializing | Self::Polling)
    }
}

/// What one attempt saw.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// The matcher produced a verdict.
    Settled {
        /// Whether the verdict is the one the mode wants.
        desired: bool,
        /// Explanation of an undesired verdict.
        explanation: Option<String>,
        /// Whether a later attempt could see a different verdict.
        may_change: bool,
        /// Whether the attempt had an observable side effect.
        side_effect: bool,
    },
    /// The source was not ready; try again.
    Transient(Error),
    /// The source or matcher failed for good.
    Errored {
        /// The error, propagated verbatim.
        error: Error,
        /// What the matcher would have said about the actual value, when
        /// there was one.
        explanation: Option<String>,
    },
}

/// What the driver should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Sleep for this long, then attempt again.
    Wait(Duration),
    /// Polling is over.
    Finish(PollOutcome),
}

/// Why a polled assertion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    /// `Eventually` ran out of time.
    TimedOut(Duration),
    /// The matcher reported that no later attempt can change its verdict.
    NoFutureChange,
    /// `Consistently` observed an undesired verdict.
    ConsistentlyViolated,
}

/// Counters collected while polling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Number of attempts made.
    pub attempts: usize,
    /// Number of attempts that had an observable side effect.
    pub side_effects: usize,
    /// Time from the first attempt to the verdict.
    pub elapsed: Duration,
}

/// Terminal verdict of a polled assertion.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The desired condition held.
    Succeeded {
        /// Attempt statistics.
        stats: PollStats,
    },
    /// The desired condition did not hold.
    Failed {
        /// Which rule ended polling.
        reason: FailReason,
        /// The matcher's explanation of the last undesired verdict.
        explanation: String,
        /// Attempt statistics.
        stats: PollStats,
    },
    /// A terminal error ended polling.
    Errored {
        /// The error, propagated verbatim.
        error: Error,
        /// The rendered actual value and matcher description, when the
        /// matcher was the one that failed.
        explanation: Option<String>,
        /// Attempt statistics.
        stats: PollStats,
    },
    /// The cancellation token fired.
    Cancelled {
        /// The last undesired explanation seen before cancellation, if any.
        explanation: Option<String>,
        /// Attempt statistics.
        stats: PollStats,
    },
}

impl PollOutcome {
    /// The terminal state this outcome corresponds to.
    #[must_use]
    pub fn state(&self) -> PollState {
        match self {
            Self::Succeeded { .. } => PollState::Succeeded,
            Self::Failed { .. } => PollState::Failed,
            Self::Errored { .. } => PollState::Errored,
            Self::Cancelled { .. } => PollState::Cancelled,
        }
    }

    /// Whether the assertion passed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Attempt statistics.
    #[must_use]
    pub fn stats(&self) -> PollStats {
        match self {
            Self::Succeeded { stats }
            | Self::Failed { stats, .. }
            | Self::Errored { stats, .. }
            | Self::Cancelled { stats, .. } => *stats,
        }
    }

    /// The error behind an errored outcome.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Errored { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Render the failure explanation. Empty for success.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Convert into a `Result`, for callers that propagate with `?`.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] when `Eventually` ran out of time
    /// - [`Error::Cancelled`] when the token fired
    /// - [`Error::AssertionFailed`] for every other failure
    /// - the original error for errored outcomes
    pub fn into_result(self) -> Result<PollStats, Error> {
        match self {
            Self::Succeeded { stats } => Ok(stats),
            Self::Failed {
                reason: FailReason::TimedOut(timeout),
                ..
            } => Err(Error::Timeout(timeout)),
            failed @ Self::Failed { .. } => Err(Error::AssertionFailed(failed.render())),
            Self::Errored { error, .. } => Err(error),
            Self::Cancelled { stats, .. } => Err(Error::Cancelled(stats.elapsed)),
        }
    }
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded { .. } => Ok(()),
            Self::Failed {
                reason,
                explanation,
                stats,
            } => {
                match reason {
                    FailReason::TimedOut(timeout) => write!(
                        f,
                        "Timed out after {:.3}s ({}).",
                        timeout.as_secs_f64(),
                        attempts(stats.attempts)
                    )?,
                    FailReason::NoFutureChange => write!(
                        f,
                        "No future change is possible. Bailing out early after {:.3}s ({}).",
                        stats.elapsed.as_secs_f64(),
                        attempts(stats.attempts)
                    )?,
                    FailReason::ConsistentlyViolated => write!(
                        f,
                        "Failed after {:.3}s ({}).",
                        stats.elapsed.as_secs_f64(),
                        attempts(stats.attempts)
                    )?,
                }
                write!(f, "\n{explanation}")
            }
            Self::Errored {
                error, explanation, ..
            } => {
                write!(f, "Error: {error}")?;
                if let Some(explanation) = explanation {
                    write!(f, "\n{explanation}")?;
                }
                Ok(())
            }
            Self::Cancelled { explanation, stats } => {
                write!(
                    f,
                    "Cancelled after {:.3}s ({}).",
                    stats.elapsed.as_secs_f64(),
                    attempts(stats.attempts)
                )?;
                if let Some(explanation) = explanation {
                    write!(f, "\n{explanation}")?;
                }
                Ok(())
            }
        }
    }
}

fn attempts(n: usize) -> String {
    if n == 1 {
        "1 attempt".to_string()
    } else {
        format!("{n} attempts")
    }
}

/// The polling state machine.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use testkit_poll::poll::{Observation, PollingPolicy, Poller, Step, Strategy};
///
/// let policy = PollingPolicy::new(Duration::from_millis(100), Duration::from_millis(10));
/// let mut poller = Poller::new(Strategy::Eventually, policy);
/// poller.start(Duration::ZERO);
///
/// let miss = Observation::Settled {
///     desired: false,
///     explanation: Some("not yet".into()),
///     may_change: true,
///     side_effect: false,
/// };
/// assert_eq!(poller.record(miss, Duration::ZERO), Step::Wait(Duration::from_millis(10)));
/// ```
#[derive(Debug, Clone)]
pub struct Poller {
    strategy: Strategy,
    policy: PollingPolicy,
    state: PollState,
    started: Duration,
    attempts: usize,
    side_effects: usize,
    streak: usize,
    last_explanation: Option<String>,
}

impl Poller {
    /// Create a poller in the `Initializing` state.
    #[must_use]
    pub fn new(strategy: Strategy, policy: PollingPolicy) -> Self {
        Self {
            strategy,
            policy,
            state: PollState::Initializing,
            started: Duration::ZERO,
            attempts: 0,
            side_effects: 0,
            streak: 0,
            last_explanation: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PollState {
        self.state
    }

    /// The strategy being polled for.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Move to `Polling`, recording `now` as the start of the budget.
    pub fn start(&mut self, now: Duration) {
        if self.state == PollState::Initializing {
            self.started = now;
            self.state = PollState::Polling;
        }
    }

    /// Budget left at `now`. `None` when the timeout is unbounded.
    #[must_use]
    pub fn remaining(&self, now: Duration) -> Option<Duration> {
        self.policy
            .timeout
            .map(|timeout| timeout.saturating_sub(self.elapsed(now)))
    }

    fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started)
    }

    fn stats(&self, now: Duration) -> PollStats {
        PollStats {
            attempts: self.attempts,
            side_effects: self.side_effects,
            elapsed: self.elapsed(now),
        }
    }

    fn finish(&mut self, outcome: PollOutcome) -> Step {
        self.state = outcome.state();
        Step::Finish(outcome)
    }

    fn succeed(&mut self, now: Duration) -> Step {
        let stats = self.stats(now);
        self.finish(PollOutcome::Succeeded { stats })
    }

    fn fail(&mut self, reason: FailReason, explanation: String, now: Duration) -> Step {
        let stats = self.stats(now);
        self.finish(PollOutcome::Failed {
            reason,
            explanation,
            stats,
        })
    }

    /// Record one attempt made at `now` and decide what happens next.
    pub fn record(&mut self, observation: Observation, now: Duration) -> Step {
        self.start(now);
        self.attempts += 1;

        match observation {
            Observation::Errored { error, explanation } => {
                let stats = self.stats(now);
                return self.finish(PollOutcome::Errored {
                    error,
                    explanation,
                    stats,
                });
            }
            Observation::Transient(error) => {
                self.streak = 0;
                let explanation = format!("The actual value was not ready: {error}");
                if self.strategy == Strategy::Consistently {
                    return self.fail(FailReason::ConsistentlyViolated, explanation, now);
                }
                self.last_explanation = Some(explanation);
            }
            Observation::Settled {
                desired,
                explanation,
                may_change,
                side_effect,
            } => {
                if side_effect {
                    self.side_effects += 1;
                }
                match (self.strategy, desired) {
                    (Strategy::Eventually, true) => {
                        self.streak += 1;
                        if self.streak >= self.policy.must_pass_repeatedly {
                            return self.succeed(now);
                        }
                        if !may_change {
                            let explanation = format!(
                                "Passed {} of {} required consecutive attempts but the outcome can no longer change",
                                self.streak, self.policy.must_pass_repeatedly
                            );
                            return self.fail(FailReason::NoFutureChange, explanation, now);
                        }
                        self.last_explanation = Some(format!(
                            "Passed {} of {} required consecutive attempts",
                            self.streak, self.policy.must_pass_repeatedly
                        ));
                    }
                    (Strategy::Eventually, false) => {
                        self.streak = 0;
                        let explanation = explanation.unwrap_or_default();
                        if !may_change {
                            return self.fail(FailReason::NoFutureChange, explanation, now);
                        }
                        self.last_explanation = Some(explanation);
                    }
                    (Strategy::Consistently, false) => {
                        let explanation = explanation.unwrap_or_default();
                        return self.fail(FailReason::ConsistentlyViolated, explanation, now);
                    }
                    (Strategy::Consistently, true) => {
                        if !may_change {
                            return self.succeed(now);
                        }
                    }
                }
            }
        }

        match self.remaining(now) {
            Some(remaining) if remaining.is_zero() => match self.strategy {
                Strategy::Consistently => self.succeed(now),
                Strategy::Eventually => {
                    let timeout = self.policy.timeout.unwrap_or_default();
                    let explanation = self.last_explanation.take().unwrap_or_default();
                    self.fail(FailReason::TimedOut(timeout), explanation, now)
                }
            },
            Some(remaining) => Step::Wait(self.policy.interval.min(remaining)),
            None => Step::Wait(self.policy.interval),
        }
    }

    /// Record that the cancellation token fired at `now`.
    pub fn cancel(&mut self, now: Duration) -> PollOutcome {
        self.start(now);
        let outcome = PollOutcome::Cancelled {
            explanation: self.last_explanation.take(),
            stats: self.stats(now),
        };
        self.state = PollState::Cancelled;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn hit() -> Observation {
        Observation::Settled {
            desired: true,
            explanation: None,
            may_change: true,
            side_effect: false,
        }
    }

    fn miss(why: &str) -> Observation {
        Observation::Settled {
            desired: false,
            explanation: Some(why.to_string()),
            may_change: true,
            side_effect: false,
        }
    }

    fn eventually(timeout: u64, interval: u64) -> Poller {
        let mut poller = Poller::new(
            Strategy::Eventually,
            PollingPolicy::new(ms(timeout), ms(interval)),
        );
        poller.start(Duration::ZERO);
        poller
    }

    #[test]
    fn test_mode_desired() {
        assert!(Mode::Affirm.desired(true));
        assert!(!Mode::Affirm.desired(false));
        assert!(Mode::Negate.desired(false));
        assert!(!Mode::Negate.desired(true));
    }

    #[test]
    fn test_state_transitions() {
        let mut poller = eventually(100, 10);
        assert_eq!(poller.state(), PollState::Polling);

        let step = poller.record(hit(), ms(0));
        assert!(matches!(step, Step::Finish(PollOutcome::Succeeded { .. })));
        assert_eq!(poller.state(), PollState::Succeeded);
        assert!(poller.state().is_terminal());
    }

    #[test]
    fn test_wait_is_clamped_to_remaining_budget() {
        let mut poller = eventually(25, 10);
        assert_eq!(poller.record(miss("a"), ms(0)), Step::Wait(ms(10)));
        assert_eq!(poller.record(miss("b"), ms(10)), Step::Wait(ms(10)));
        assert_eq!(poller.record(miss("c"), ms(20)), Step::Wait(ms(5)));

        match poller.record(miss("d"), ms(25)) {
            Step::Finish(outcome @ PollOutcome::Failed { .. }) => {
                let text = outcome.render();
                assert!(text.starts_with("Timed out after 0.025s (4 attempts)."));
                assert!(text.ends_with("\nd"));
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_slow_attempt_consumes_budget() {
        let mut poller = eventually(100, 10);
        // An attempt that itself took longer than the timeout ends polling
        assert!(matches!(
            poller.record(miss("slow"), ms(150)),
            Step::Finish(PollOutcome::Failed {
                reason: FailReason::TimedOut(_),
                ..
            })
        ));
    }

    #[test]
    fn test_errors_are_terminal() {
        let mut poller = eventually(10_000, 10);
        let errored = Observation::Errored {
            error: Error::closed("closed"),
            explanation: None,
        };
        match poller.record(errored, ms(1)) {
            Step::Finish(outcome) => {
                assert_eq!(outcome.state(), PollState::Errored);
                assert_eq!(outcome.stats().attempts, 1);
                assert_eq!(outcome.render(), "Error: closed");
            }
            Step::Wait(_) => panic!("errors must not be retried"),
        }
    }

    #[test]
    fn test_errored_render_keeps_matcher_explanation() {
        let mut poller = eventually(10_000, 10);
        let errored = Observation::Errored {
            error: Error::closed("channel closed"),
            explanation: Some("Expected\n    <chan int>: len=0 cap=0 closed\nto send\n    <int>: 1".into()),
        };
        let Step::Finish(outcome) = poller.record(errored, ms(0)) else {
            panic!("errors must not be retried");
        };
        assert_eq!(
            outcome.render(),
            "Error: channel closed\nExpected\n    <chan int>: len=0 cap=0 closed\nto send\n    <int>: 1"
        );
        assert_eq!(outcome.into_result(), Err(Error::closed("channel closed")));
    }

    #[test]
    fn test_transient_errors_are_retried() {
        let mut poller = eventually(20, 10);
        assert_eq!(
            poller.record(Observation::Transient(Error::not_ready("warming")), ms(0)),
            Step::Wait(ms(10))
        );
        assert_eq!(
            poller.record(Observation::Transient(Error::not_ready("warming")), ms(10)),
            Step::Wait(ms(10))
        );
        match poller.record(Observation::Transient(Error::not_ready("warming")), ms(20)) {
            Step::Finish(outcome) => assert!(outcome.render().contains("not ready")),
            Step::Wait(_) => panic!("expected timeout"),
        }
    }

    #[test]
    fn test_no_future_change_bails_out() {
        let mut poller = eventually(10_000, 10);
        let obs = Observation::Settled {
            desired: false,
            explanation: Some("closed".into()),
            may_change: false,
            side_effect: false,
        };
        match poller.record(obs, ms(0)) {
            Step::Finish(PollOutcome::Failed { reason, .. }) => {
                assert_eq!(reason, FailReason::NoFutureChange);
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_must_pass_repeatedly_resets_on_miss() {
        let mut policy = PollingPolicy::new(ms(1000), ms(10));
        policy.must_pass_repeatedly = 2;
        let mut poller = Poller::new(Strategy::Eventually, policy);
        poller.start(Duration::ZERO);

        assert_eq!(poller.record(hit(), ms(0)), Step::Wait(ms(10)));
        assert_eq!(poller.record(miss("x"), ms(10)), Step::Wait(ms(10)));
        assert_eq!(poller.record(hit(), ms(20)), Step::Wait(ms(10)));
        assert!(matches!(
            poller.record(hit(), ms(30)),
            Step::Finish(PollOutcome::Succeeded { .. })
        ));
    }

    #[test]
    fn test_consistently() {
        let mut poller = Poller::new(
            Strategy::Consistently,
            PollingPolicy::new(ms(30), ms(10)),
        );
        poller.start(Duration::ZERO);

        assert_eq!(poller.record(hit(), ms(0)), Step::Wait(ms(10)));
        assert_eq!(poller.record(hit(), ms(10)), Step::Wait(ms(10)));
        assert_eq!(poller.record(hit(), ms(20)), Step::Wait(ms(10)));
        match poller.record(hit(), ms(30)) {
            Step::Finish(outcome) => {
                assert!(outcome.is_success());
                assert_eq!(outcome.stats().attempts, 4);
            }
            Step::Wait(_) => panic!("window should have elapsed"),
        }
    }

    #[test]
    fn test_consistently_fails_on_first_miss() {
        let mut poller = Poller::new(
            Strategy::Consistently,
            PollingPolicy::new(ms(1000), ms(10)),
        );
        poller.start(Duration::ZERO);
        assert_eq!(poller.record(hit(), ms(0)), Step::Wait(ms(10)));
        match poller.record(miss("boom"), ms(10)) {
            Step::Finish(outcome) => {
                assert_eq!(outcome.render(), "Failed after 0.010s (2 attempts).\nboom");
            }
            Step::Wait(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_side_effects_are_counted() {
        let mut poller = eventually(1000, 10);
        let obs = Observation::Settled {
            desired: true,
            explanation: None,
            may_change: true,
            side_effect: true,
        };
        match poller.record(obs, ms(0)) {
            Step::Finish(outcome) => assert_eq!(outcome.stats().side_effects, 1),
            Step::Wait(_) => panic!("expected success"),
        }
    }

    #[test]
    fn test_cancel_keeps_last_explanation() {
        let mut poller = eventually(1000, 10);
        let _ = poller.record(miss("still waiting"), ms(0));
        let outcome = poller.cancel(ms(5));
        assert_eq!(outcome.state(), PollState::Cancelled);
        assert_eq!(
            outcome.render(),
            "Cancelled after 0.005s (1 attempt).\nstill waiting"
        );
    }

    #[test]
    fn test_into_result() {
        let mut poller = eventually(10, 10);
        let Step::Finish(outcome) = poller.record(miss("x"), ms(10)) else {
            panic!("expected timeout");
        };
        assert_eq!(outcome.into_result(), Err(Error::Timeout(ms(10))));

        let mut poller = eventually(10, 10);
        assert_eq!(
            poller.cancel(ms(3)).into_result(),
            Err(Error::Cancelled(ms(3)))
        );

        let mut poller = eventually(10, 10);
        let Step::Finish(outcome) = poller.record(hit(), ms(1)) else {
            panic!("expected success");
        };
        assert_eq!(outcome.into_result().map(|s| s.attempts), Ok(1));
    }

    #[test]
    fn test_unbounded_timeout_keeps_interval() {
        let policy = PollingPolicy {
            timeout: None,
            interval: ms(10),
            must_pass_repeatedly: 1,
        };
        let mut poller = Poller::new(Strategy::Eventually, policy);
        poller.start(Duration::ZERO);
        assert_eq!(poller.remaining(ms(5)), None);
        assert_eq!(poller.record(miss("x"), ms(1_000_000)), Step::Wait(ms(10)));
    }
}
