use chrono::{DateTime, Utc};
use serde::Serialize;

use super::job::RetryPolicy;
use super::state::AttemptState;
use crate::error::{ErrorKind, ProviderError};
use crate::provider::Ticket;

/// One provider's submit → poll cycle for a single job.
///
/// The attempt owns its ticket outright; it is dropped as soon as the
/// attempt leaves the polling loop without a solution.
#[derive(Debug)]
pub struct Attempt {
    pub provider: String,
    pub policy: RetryPolicy,
    pub state: AttemptState,
    pub history: Vec<AttemptState>,
    pub polls: u32,
    pub solution: Option<String>,
    pub last_error: Option<ProviderError>,
    pub started_at: DateTime<Utc>,
    pub(super) ticket: Option<Ticket>,
}

impl Attempt {
    pub fn new(provider: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            provider: provider.into(),
            policy,
            state: AttemptState::Submitting,
            history: Vec::new(),
            polls: 0,
            solution: None,
            last_error: None,
            started_at: Utc::now(),
            ticket: None,
        }
    }

    pub fn ticket(&self) -> Option<&Ticket> {
        self.ticket.as_ref()
    }

    /// Hands the ticket out once, e.g. to build a feedback handle.
    pub fn take_ticket(&mut self) -> Option<Ticket> {
        self.ticket.take()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.last_error.as_ref().map(|e| e.kind)
    }

    pub(super) fn enter(&mut self, state: AttemptState) {
        self.history.push(self.state);
        self.state = state;
    }
}

/// Structured record produced when an attempt terminates.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub provider: String,
    pub final_state: AttemptState,
    pub state_transitions: Vec<AttemptState>,
    pub polls: u32,
    pub max_polls: u32,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl AttemptRecord {
    pub fn from_attempt(attempt: &Attempt) -> Self {
        let now = Utc::now();
        let mut transitions = attempt.history.clone();
        transitions.push(attempt.state);

        Self {
            provider: attempt.provider.clone(),
            final_state: attempt.state,
            state_transitions: transitions,
            polls: attempt.polls,
            max_polls: attempt.policy.max_attempts,
            error_kind: attempt.error_kind(),
            error_message: attempt.last_error.as_ref().map(|e| e.message.clone()),
            started_at: attempt.started_at,
            completed_at: now,
            duration_ms: (now - attempt.started_at).num_milliseconds(),
        }
    }

    pub fn solved(&self) -> bool {
        self.final_state == AttemptState::Solved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_creation_defaults() {
        let attempt = Attempt::new("antigate", RetryPolicy::default());
        assert_eq!(attempt.state, AttemptState::Submitting);
        assert_eq!(attempt.polls, 0);
        assert!(attempt.history.is_empty());
        assert!(attempt.ticket().is_none());
        assert!(attempt.error_kind().is_none());
    }

    #[test]
    fn take_ticket_only_once() {
        let mut attempt = Attempt::new("antigate", RetryPolicy::default());
        attempt.ticket = Some(Ticket::new("99"));
        assert_eq!(attempt.take_ticket(), Some(Ticket::new("99")));
        assert_eq!(attempt.take_ticket(), None);
    }

    #[test]
    fn record_from_attempt() {
        let mut attempt = Attempt::new("hydati", RetryPolicy::from_secs(5, 2, 6));
        attempt.enter(AttemptState::Fatal);
        attempt.last_error = Some(ProviderError::with_message(
            "hydati",
            ErrorKind::Unsolvable,
            "#timeout",
        ));

        let record = AttemptRecord::from_attempt(&attempt);
        assert_eq!(record.provider, "hydati");
        assert_eq!(record.final_state, AttemptState::Fatal);
        assert_eq!(
            record.state_transitions,
            vec![AttemptState::Submitting, AttemptState::Fatal]
        );
        assert_eq!(record.max_polls, 6);
        assert_eq!(record.error_kind, Some(ErrorKind::Unsolvable));
        assert_eq!(record.error_message.as_deref(), Some("#timeout"));
        assert!(!record.solved());
    }

    #[test]
    fn record_serializes_snake_case() {
        let attempt = Attempt::new("antigate", RetryPolicy::default());
        let json = serde_json::to_value(AttemptRecord::from_attempt(&attempt)).unwrap();
        assert_eq!(json["final_state"], "submitting");
        assert!(json["error_kind"].is_null());
    }
}
