//! Scripted provider for state machine and orchestrator tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{FeedbackHandle, PollOutcome, Provider, Ticket};
use crate::error::ProviderError;
use crate::state_machine::{Job, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Submit,
    Poll,
}

/// Replays a fixed submit result and poll sequence, recording every call.
///
/// The call log can be shared between several providers to observe the
/// order in which a chain touched them.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    name: String,
    policy: RetryPolicy,
    submit: Result<Ticket, ProviderError>,
    polls: Arc<Mutex<VecDeque<PollOutcome>>>,
    calls: Arc<Mutex<Vec<Call>>>,
    withdrawn: Arc<Mutex<Vec<Ticket>>>,
    log: Arc<Mutex<Vec<(String, Call)>>>,
}

impl ScriptedProvider {
    pub fn new(name: &str, policy: RetryPolicy) -> Self {
        Self {
            name: name.to_string(),
            policy,
            submit: Ok(Ticket::new(format!("{name}-ticket"))),
            polls: Arc::default(),
            calls: Arc::default(),
            withdrawn: Arc::default(),
            log: Arc::default(),
        }
    }

    pub fn polls(self, outcomes: Vec<PollOutcome>) -> Self {
        *self.polls.lock().unwrap() = outcomes.into();
        self
    }

    pub fn submit_error(mut self, err: ProviderError) -> Self {
        self.submit = Err(err);
        self
    }

    pub fn shared_log(mut self, log: Arc<Mutex<Vec<(String, Call)>>>) -> Self {
        self.log = log;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn withdrawn(&self) -> Vec<Ticket> {
        self.withdrawn.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Poll).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call.clone());
        self.log.lock().unwrap().push((self.name.clone(), call));
    }
}

impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn submit(&self, _job: &Job) -> Result<Ticket, ProviderError> {
        self.record(Call::Submit);
        self.submit.clone()
    }

    async fn poll(&self, _ticket: &Ticket) -> PollOutcome {
        self.record(Call::Poll);
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PollOutcome::Pending)
    }

    fn withdraw(&self, ticket: &Ticket) {
        self.withdrawn.lock().unwrap().push(ticket.clone());
    }

    fn feedback(&self, _ticket: &Ticket) -> Option<FeedbackHandle> {
        Some(FeedbackHandle::new(self.name.clone(), async { Ok(()) }))
    }
}
