use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::attempt::Attempt;
use crate::error::{ErrorKind, ProviderError};
use crate::provider::{PollOutcome, Ticket};

/// States of one provider attempt.
///
/// Each attempt flows through: SUBMITTING → INITIAL_DELAY → POLLING →
/// (POLL_DELAY → POLLING)* → SOLVED | EXHAUSTED | FATAL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Submitting,
    InitialDelay,
    Polling,
    PollDelay,
    Solved,
    Exhausted,
    Fatal,
}

impl AttemptState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttemptState::Solved | AttemptState::Exhausted | AttemptState::Fatal
        )
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptState::Submitting => write!(f, "SUBMITTING"),
            AttemptState::InitialDelay => write!(f, "INITIAL_DELAY"),
            AttemptState::Polling => write!(f, "POLLING"),
            AttemptState::PollDelay => write!(f, "POLL_DELAY"),
            AttemptState::Solved => write!(f, "SOLVED"),
            AttemptState::Exhausted => write!(f, "EXHAUSTED"),
            AttemptState::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Something that happened outside the state machine.
#[derive(Debug)]
pub enum Event {
    Submitted(Ticket),
    SubmitFailed(ProviderError),
    DelayElapsed,
    Polled(PollOutcome),
    Canceled,
}

/// What the driver has to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Submit,
    Wait(Duration),
    Poll,
    Done,
}

/// Advances an [`Attempt`] one event at a time.
pub struct PollingStateMachine;

impl PollingStateMachine {
    /// Apply `event` to the attempt and return the next step.
    ///
    /// - `Submitting`: a ticket starts the initial delay, a failure is fatal.
    ///   A ticket that already carries the answer is polled at once.
    /// - `InitialDelay` / `PollDelay`: an elapsed timer triggers a poll.
    /// - `Polling`: solved ends the attempt; pending and retryable errors
    ///   consume one poll from the budget; fatal errors end it at once.
    /// - Cancellation ends any live attempt as `Fatal`.
    ///
    /// Events that do not apply to the current state are ignored and the
    /// current step is issued again. Terminal states always yield `Done`.
    pub fn next(attempt: &mut Attempt, event: Event) -> Step {
        if attempt.state.is_terminal() {
            return Step::Done;
        }

        match (attempt.state, event) {
            (_, Event::Canceled) => {
                let err = ProviderError::new(attempt.provider.clone(), ErrorKind::OperationCanceled);
                Self::fail(attempt, AttemptState::Fatal, err)
            }
            (AttemptState::Submitting, Event::Submitted(ticket)) => {
                attempt.ticket = Some(ticket);
                if attempt.policy.max_attempts == 0 {
                    let err = ProviderError::new(attempt.provider.clone(), ErrorKind::NotReadyYet);
                    return Self::fail(attempt, AttemptState::Exhausted, err);
                }
                if attempt.ticket().is_some_and(|t| t.answer().is_some()) {
                    attempt.enter(AttemptState::Polling);
                    return Step::Poll;
                }
                attempt.enter(AttemptState::InitialDelay);
                Step::Wait(attempt.policy.initial_delay)
            }
            (AttemptState::Submitting, Event::SubmitFailed(err)) => {
                Self::fail(attempt, AttemptState::Fatal, err)
            }
            (AttemptState::InitialDelay | AttemptState::PollDelay, Event::DelayElapsed) => {
                attempt.enter(AttemptState::Polling);
                Step::Poll
            }
            (AttemptState::Polling, Event::Polled(outcome)) => Self::handle_poll(attempt, outcome),
            (_, _) => Self::resume(attempt),
        }
    }

    /// The step matching the attempt's current state.
    pub fn resume(attempt: &Attempt) -> Step {
        match attempt.state {
            AttemptState::Submitting => Step::Submit,
            AttemptState::InitialDelay => Step::Wait(attempt.policy.initial_delay),
            AttemptState::Polling => Step::Poll,
            AttemptState::PollDelay => Step::Wait(attempt.policy.poll_delay),
            AttemptState::Solved | AttemptState::Exhausted | AttemptState::Fatal => Step::Done,
        }
    }

    fn handle_poll(attempt: &mut Attempt, outcome: PollOutcome) -> Step {
        let retryable = match outcome {
            PollOutcome::Solved(text) => {
                attempt.polls += 1;
                attempt.solution = Some(text);
                attempt.last_error = None;
                attempt.enter(AttemptState::Solved);
                return Step::Done;
            }
            PollOutcome::Fatal(err) => {
                attempt.polls += 1;
                return Self::fail(attempt, AttemptState::Fatal, err);
            }
            PollOutcome::Pending => {
                ProviderError::new(attempt.provider.clone(), ErrorKind::NotReadyYet)
            }
            PollOutcome::Retryable(err) => err,
        };

        attempt.polls += 1;
        if attempt.polls >= attempt.policy.max_attempts {
            return Self::fail(attempt, AttemptState::Exhausted, retryable);
        }
        attempt.last_error = Some(retryable);
        attempt.enter(AttemptState::PollDelay);
        Step::Wait(attempt.policy.poll_delay)
    }

    fn fail(attempt: &mut Attempt, state: AttemptState, err: ProviderError) -> Step {
        attempt.ticket = None;
        attempt.last_error = Some(err);
        attempt.enter(state);
        Step::Done
    }
}
