//! channel_friend: asks a human operator over an in-process relay.
//!
//! [`RelayChannel`] is the adapter's end: it posts questions and reads the
//! answer board. [`RelayInbox`] is the operator's end: it receives questions
//! and wrong-answer notices and records answers or refusals by question id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use super::{FeedbackHandle, PollOutcome, Provider, Ticket};
use crate::error::{ErrorKind, ProviderError};
use crate::state_machine::{Job, RetryPolicy};

pub const NAME: &str = "channel_friend";

/// Humans are slow: 20 s before the first look, then every 5 s.
pub const POLICY: RetryPolicy = RetryPolicy::from_secs(20, 5, 8);

const INBOX_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayQuestion {
    pub id: u64,
    pub image: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    Question(RelayQuestion),
    /// The answer given for `id` turned out to be wrong.
    WrongAnswer { id: u64 },
    /// The attempt behind `id` ended; answers to it are no longer read.
    Withdrawn { id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Answered(String),
    Declined,
}

/// Open questions by id. A slot holds the operator's verdict until a poll
/// takes it; ids without a slot are closed and their verdicts are dropped.
type Board = Arc<Mutex<HashMap<u64, Option<Verdict>>>>;

fn lock(board: &Board) -> MutexGuard<'_, HashMap<u64, Option<Verdict>>> {
    board.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sending half of the relay, held by the adapter.
#[derive(Debug, Clone)]
pub struct RelayChannel {
    tx: mpsc::Sender<RelayMessage>,
    board: Board,
    next_id: Arc<AtomicU64>,
}

/// Operator half of the relay.
#[derive(Debug)]
pub struct RelayInbox {
    rx: mpsc::Receiver<RelayMessage>,
    board: Board,
}

impl RelayChannel {
    pub fn new() -> (RelayChannel, RelayInbox) {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let board = Board::default();
        let channel = RelayChannel {
            tx,
            board: board.clone(),
            next_id: Arc::new(AtomicU64::new(1)),
        };
        (channel, RelayInbox { rx, board })
    }

    /// Posts a question and returns its id.
    pub fn ask(&self, image: &[u8]) -> Result<u64, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let question = RelayMessage::Question(RelayQuestion {
            id,
            image: image.to_vec(),
        });
        lock(&self.board).insert(id, None);
        match self.tx.try_send(question) {
            Ok(()) => Ok(id),
            Err(err) => {
                lock(&self.board).remove(&id);
                let message = match err {
                    TrySendError::Full(_) => "operator inbox is full",
                    TrySendError::Closed(_) => "no operator is listening",
                };
                Err(ProviderError::with_message(NAME, ErrorKind::NoCapacity, message))
            }
        }
    }

    /// Checks the board for `id`. A verdict closes the question.
    fn take_verdict(&self, id: u64) -> Option<Verdict> {
        let mut board = lock(&self.board);
        let verdict = board.get_mut(&id)?.take()?;
        board.remove(&id);
        Some(verdict)
    }

    /// Closes `id` and tells the operator, if one is still listening.
    pub fn withdraw(&self, id: u64) {
        if lock(&self.board).remove(&id).is_some()
            && self.tx.try_send(RelayMessage::Withdrawn { id }).is_err()
        {
            debug!(id, "operator gone, withdrawal notice dropped");
        }
    }

    fn report_wrong(&self, id: u64) -> bool {
        self.tx.try_send(RelayMessage::WrongAnswer { id }).is_ok()
    }

    #[cfg(test)]
    fn open_questions(&self) -> usize {
        lock(&self.board).len()
    }
}

impl RelayInbox {
    /// Waits for the next message; `None` once every channel handle is gone.
    pub async fn recv(&mut self) -> Option<RelayMessage> {
        self.rx.recv().await
    }

    /// Records an answer. Returns `false` when the question is no longer open.
    pub fn answer(&self, id: u64, text: impl Into<String>) -> bool {
        self.record(id, Verdict::Answered(text.into()))
    }

    /// Gives up on a question; the attempt fails as unsolvable.
    pub fn decline(&self, id: u64) -> bool {
        self.record(id, Verdict::Declined)
    }

    fn record(&self, id: u64, verdict: Verdict) -> bool {
        match lock(&self.board).get_mut(&id) {
            Some(slot) => {
                *slot = Some(verdict);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelFriend {
    relay: RelayChannel,
    policy: RetryPolicy,
}

impl ChannelFriend {
    pub fn new(relay: RelayChannel) -> Self {
        Self {
            relay,
            policy: POLICY,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

fn question_id(ticket: &Ticket) -> Result<u64, ProviderError> {
    ticket.as_str().parse().map_err(|_| {
        ProviderError::with_message(
            NAME,
            ErrorKind::UnexpectedResponse,
            format!("malformed relay ticket {ticket}"),
        )
    })
}

impl Provider for ChannelFriend {
    fn name(&self) -> &str {
        NAME
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn submit(&self, job: &Job) -> Result<Ticket, ProviderError> {
        let id = self.relay.ask(job.image())?;
        debug!(id, "question posted to operator");
        Ok(Ticket::new(id.to_string()))
    }

    async fn poll(&self, ticket: &Ticket) -> PollOutcome {
        let id = match question_id(ticket) {
            Ok(id) => id,
            Err(err) => return PollOutcome::Fatal(err),
        };
        match self.relay.take_verdict(id) {
            Some(Verdict::Answered(text)) => PollOutcome::Solved(text),
            Some(Verdict::Declined) => PollOutcome::Fatal(ProviderError::with_message(
                NAME,
                ErrorKind::Unsolvable,
                "operator declined the question",
            )),
            None => PollOutcome::Pending,
        }
    }

    fn withdraw(&self, ticket: &Ticket) {
        if let Ok(id) = question_id(ticket) {
            self.relay.withdraw(id);
        }
    }

    fn feedback(&self, ticket: &Ticket) -> Option<FeedbackHandle> {
        let id = question_id(ticket).ok()?;
        let relay = self.relay.clone();
        Some(FeedbackHandle::new(NAME, async move {
            if !relay.report_wrong(id) {
                debug!(id, "operator gone, wrong-answer notice dropped");
            }
            Ok(())
        }))
    }
}
