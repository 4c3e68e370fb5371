//! Integrations with the external solving services.
//!
//! Every adapter implements [`Provider`]: how to hand an image over, how to
//! read one status check back into a [`PollOutcome`], and how long to wait
//! between checks. That translation is the only provider-specific logic; the
//! polling and fallback machinery is shared.

pub mod antigate;
pub mod avplayer;
pub mod channel_friend;
pub mod deathbycaptcha;
mod feedback;
pub mod hydati;
pub mod jsdati;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::future::Future;

pub use antigate::Antigate;
pub use avplayer::Avplayer;
pub use channel_friend::{ChannelFriend, RelayChannel, RelayInbox, RelayMessage, RelayQuestion};
pub use deathbycaptcha::DeathByCaptcha;
pub use feedback::FeedbackHandle;
pub use hydati::Hydati;
pub use jsdati::Jsdati;

use crate::error::ProviderError;
use crate::state_machine::{Job, RetryPolicy};

/// Provider-issued job identifier, valid for one attempt only.
///
/// Some services answer the upload itself when the image was seen before;
/// such a ticket carries the answer and is polled without waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    id: String,
    answer: Option<String>,
}

impl Ticket {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            answer: None,
        }
    }

    pub fn with_answer(mut self, text: impl Into<String>) -> Self {
        self.answer = Some(text.into());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Normalized result of one status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No answer yet, keep polling.
    Pending,
    Solved(String),
    /// Transient condition; costs one poll but keeps the attempt alive.
    Retryable(ProviderError),
    /// Ends the attempt immediately.
    Fatal(ProviderError),
}

impl PollOutcome {
    /// Routes an error by its kind's retry classification.
    pub fn from_error(err: ProviderError) -> Self {
        if err.is_retryable() {
            PollOutcome::Retryable(err)
        } else {
            PollOutcome::Fatal(err)
        }
    }
}

/// Capability every solving service integration provides.
///
/// Calls for one ticket are strictly sequential. Implementations keep no
/// request-scoped state, so one value may serve concurrent decode requests.
pub trait Provider {
    fn name(&self) -> &str;

    fn retry_policy(&self) -> RetryPolicy;

    /// Hands the image to the service. An error means polling never starts.
    fn submit(&self, job: &Job) -> impl Future<Output = Result<Ticket, ProviderError>> + Send;

    fn poll(&self, ticket: &Ticket) -> impl Future<Output = PollOutcome> + Send;

    /// Called once when an attempt holding `ticket` ends without an answer.
    fn withdraw(&self, _ticket: &Ticket) {}

    /// Builds the "report wrong answer" action, for services that support one.
    fn feedback(&self, _ticket: &Ticket) -> Option<FeedbackHandle> {
        None
    }
}

/// The closed set of adapters a chain can be built from.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    Antigate(Antigate),
    DeathByCaptcha(DeathByCaptcha),
    Jsdati(Jsdati),
    Hydati(Hydati),
    ChannelFriend(ChannelFriend),
    Avplayer(Avplayer),
}

impl Provider for AnyProvider {
    fn name(&self) -> &str {
        match self {
            AnyProvider::Antigate(p) => p.name(),
            AnyProvider::DeathByCaptcha(p) => p.name(),
            AnyProvider::Jsdati(p) => p.name(),
            AnyProvider::Hydati(p) => p.name(),
            AnyProvider::ChannelFriend(p) => p.name(),
            AnyProvider::Avplayer(p) => p.name(),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        match self {
            AnyProvider::Antigate(p) => p.retry_policy(),
            AnyProvider::DeathByCaptcha(p) => p.retry_policy(),
            AnyProvider::Jsdati(p) => p.retry_policy(),
            AnyProvider::Hydati(p) => p.retry_policy(),
            AnyProvider::ChannelFriend(p) => p.retry_policy(),
            AnyProvider::Avplayer(p) => p.retry_policy(),
        }
    }

    async fn submit(&self, job: &Job) -> Result<Ticket, ProviderError> {
        match self {
            AnyProvider::Antigate(p) => p.submit(job).await,
            AnyProvider::DeathByCaptcha(p) => p.submit(job).await,
            AnyProvider::Jsdati(p) => p.submit(job).await,
            AnyProvider::Hydati(p) => p.submit(job).await,
            AnyProvider::ChannelFriend(p) => p.submit(job).await,
            AnyProvider::Avplayer(p) => p.submit(job).await,
        }
    }

    async fn poll(&self, ticket: &Ticket) -> PollOutcome {
        match self {
            AnyProvider::Antigate(p) => p.poll(ticket).await,
            AnyProvider::DeathByCaptcha(p) => p.poll(ticket).await,
            AnyProvider::Jsdati(p) => p.poll(ticket).await,
            AnyProvider::Hydati(p) => p.poll(ticket).await,
            AnyProvider::ChannelFriend(p) => p.poll(ticket).await,
            AnyProvider::Avplayer(p) => p.poll(ticket).await,
        }
    }

    fn withdraw(&self, ticket: &Ticket) {
        match self {
            AnyProvider::Antigate(p) => p.withdraw(ticket),
            AnyProvider::DeathByCaptcha(p) => p.withdraw(ticket),
            AnyProvider::Jsdati(p) => p.withdraw(ticket),
            AnyProvider::Hydati(p) => p.withdraw(ticket),
            AnyProvider::ChannelFriend(p) => p.withdraw(ticket),
            AnyProvider::Avplayer(p) => p.withdraw(ticket),
        }
    }

    fn feedback(&self, ticket: &Ticket) -> Option<FeedbackHandle> {
        match self {
            AnyProvider::Antigate(p) => p.feedback(ticket),
            AnyProvider::DeathByCaptcha(p) => p.feedback(ticket),
            AnyProvider::Jsdati(p) => p.feedback(ticket),
            AnyProvider::Hydati(p) => p.feedback(ticket),
            AnyProvider::ChannelFriend(p) => p.feedback(ticket),
            AnyProvider::Avplayer(p) => p.feedback(ticket),
        }
    }
}
