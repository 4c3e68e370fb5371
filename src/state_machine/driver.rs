use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::attempt::{Attempt, AttemptRecord};
use super::job::Job;
use super::state::{AttemptState, Event, PollingStateMachine, Step};
use crate::error::{ErrorKind, ProviderError};
use crate::provider::{FeedbackHandle, Provider, Ticket};

/// How an attempt ended.
#[derive(Debug)]
pub enum AttemptOutcome {
    Solved {
        text: String,
        feedback: Option<FeedbackHandle>,
    },
    Exhausted(ProviderError),
    Fatal(ProviderError),
}

#[derive(Debug)]
pub struct AttemptReport {
    pub record: AttemptRecord,
    pub outcome: AttemptOutcome,
}

/// Runs one provider's submit → delay → poll loop to completion.
///
/// The attempt only suspends while submitting, polling or sleeping; each of
/// those waits is raced against `cancel`.
pub async fn run_attempt<P: Provider>(
    provider: &P,
    job: &Job,
    cancel: &CancellationToken,
) -> AttemptReport {
    let mut attempt = Attempt::new(provider.name(), provider.retry_policy());
    let mut step = PollingStateMachine::resume(&attempt);
    let mut issued = None;

    loop {
        let event = match step {
            Step::Done => break,
            Step::Submit => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Event::Canceled,
                    submitted = provider.submit(job) => match submitted {
                        Ok(ticket) => {
                            debug!(ticket = %ticket, "submitted");
                            issued = Some(ticket.clone());
                            Event::Submitted(ticket)
                        }
                        Err(err) => Event::SubmitFailed(err),
                    },
                }
            }
            Step::Wait(delay) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Event::Canceled,
                    _ = sleep(delay) => Event::DelayElapsed,
                }
            }
            Step::Poll => {
                let Some(ticket) = attempt.ticket() else {
                    break;
                };
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Event::Canceled,
                    outcome = provider.poll(ticket) => {
                        debug!(poll = attempt.polls + 1, ?outcome, "polled");
                        Event::Polled(outcome)
                    }
                }
            }
        };

        let from = attempt.state;
        step = PollingStateMachine::next(&mut attempt, event);
        debug!(%from, to = %attempt.state, "transition");
    }

    let outcome = finish(provider, &mut attempt, issued);
    AttemptReport {
        record: AttemptRecord::from_attempt(&attempt),
        outcome,
    }
}

/// `issued` is the ticket the provider handed out, if any; the state machine
/// drops its own copy on failure, so the driver keeps one to withdraw it.
fn finish<P: Provider>(provider: &P, attempt: &mut Attempt, issued: Option<Ticket>) -> AttemptOutcome {
    let error = attempt.last_error.clone().unwrap_or_else(|| {
        ProviderError::with_message(
            attempt.provider.clone(),
            ErrorKind::UnexpectedResponse,
            "attempt ended without a result",
        )
    });

    if attempt.state != AttemptState::Solved
        && let Some(ticket) = issued
    {
        provider.withdraw(&ticket);
    }

    match attempt.state {
        AttemptState::Solved => {
            let feedback = attempt
                .take_ticket()
                .and_then(|ticket| provider.feedback(&ticket));
            let text = attempt.solution.clone().unwrap_or_default();
            info!(polls = attempt.polls, "solved");
            AttemptOutcome::Solved { text, feedback }
        }
        AttemptState::Exhausted => {
            warn!(polls = attempt.polls, error = %error, "exhausted");
            AttemptOutcome::Exhausted(error)
        }
        _ => {
            warn!(polls = attempt.polls, error = %error, "failed");
            AttemptOutcome::Fatal(error)
        }
    }
}
