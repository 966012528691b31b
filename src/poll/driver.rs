//! Blocking and async drivers around [`Poller`].

use futures::future::{self, Either};
use tracing::{debug, trace};

use super::{CancelToken, Mode, Observation, PollOutcome, Poller, Source, Step};
use crate::clock::{Clock, TimeSource, Wake};
use crate::matcher::{EvalContext, Matcher};

/// Run one attempt: produce the actual value, then evaluate the matcher.
pub(crate) fn attempt(
    source: &mut Source<'_>,
    matcher: &dyn Matcher,
    mode: Mode,
    cx: &EvalContext,
) -> Observation {
    let actual = match source.produce(cx.cancel()) {
        Ok(actual) => actual,
        Err(err) if err.is_retryable() => return Observation::Transient(err),
        Err(error) => {
            return Observation::Errored {
                error,
                explanation: None,
            }
        }
    };
    match matcher.evaluate_in(&actual, cx) {
        Ok(matched) => {
            let desired = mode.desired(matched);
            Observation::Settled {
                desired,
                explanation: (!desired).then(|| mode.explain(matcher, &actual)),
                may_change: matcher.may_change(&actual),
                side_effect: matcher.performed_side_effect(),
            }
        }
        Err(err) if err.is_retryable() => Observation::Transient(err),
        Err(error) => Observation::Errored {
            explanation: Some(mode.explain(matcher, &actual)),
            error,
        },
    }
}

fn log_outcome(poller: &Poller, outcome: &PollOutcome) {
    let stats = outcome.stats();
    debug!(
        strategy = poller.strategy().name(),
        state = ?outcome.state(),
        attempts = stats.attempts,
        side_effects = stats.side_effects,
        elapsed = ?stats.elapsed,
        "polling finished"
    );
}

/// Drive `poller` on the calling thread, sleeping through `clock`.
pub(crate) fn run_blocking(
    mut poller: Poller,
    source: &mut Source<'_>,
    matcher: &dyn Matcher,
    mode: Mode,
    clock: &dyn Clock,
    cancel: &CancelToken,
) -> PollOutcome {
    poller.start(clock.now());
    let outcome = loop {
        if cancel.is_cancelled() {
            break poller.cancel(clock.now());
        }
        let cx = EvalContext::new(poller.remaining(clock.now()), cancel.clone());
        let observation = attempt(source, matcher, mode, &cx);
        // An evaluation already underway finishes, but its result is dropped
        if cancel.is_cancelled() {
            break poller.cancel(clock.now());
        }
        trace!(state = ?poller.state(), ?observation, "attempt");
        match poller.record(observation, clock.now()) {
            Step::Finish(outcome) => break outcome,
            Step::Wait(delay) => {
                trace!(?delay, "sleeping");
                if clock.sleep(delay, cancel) == Wake::Cancelled {
                    break poller.cancel(clock.now());
                }
            }
        }
    };
    log_outcome(&poller, &outcome);
    outcome
}

/// Drive `poller` from an async task, racing each sleep against `cancel`.
///
/// Attempts themselves still run synchronously; only the waits between them
/// yield to the executor.
pub(crate) async fn run_async(
    mut poller: Poller,
    source: &mut Source<'_>,
    matcher: &dyn Matcher,
    mode: Mode,
    time: &dyn TimeSource,
    cancel: &CancelToken,
) -> PollOutcome {
    poller.start(time.now());
    let outcome = loop {
        if cancel.is_cancelled() {
            break poller.cancel(time.now());
        }
        let cx = EvalContext::new(poller.remaining(time.now()), cancel.clone());
        let observation = attempt(source, matcher, mode, &cx);
        if cancel.is_cancelled() {
            break poller.cancel(time.now());
        }
        trace!(state = ?poller.state(), ?observation, "attempt");
        match poller.record(observation, time.now()) {
            Step::Finish(outcome) => break outcome,
            Step::Wait(delay) => {
                trace!(?delay, "sleeping");
                match future::select(time.sleep(delay), cancel.cancelled()).await {
                    Either::Left(((), _)) => {}
                    Either::Right(((), _)) => break poller.cancel(time.now()),
                }
            }
        }
    };
    log_outcome(&poller, &outcome);
    outcome
}
