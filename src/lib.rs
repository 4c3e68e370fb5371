//! CAPTCHA decoding through an ordered fallback chain of solving services.
//!
//! Each provider runs the same submit, wait, poll cycle driven by
//! [`state_machine::PollingStateMachine`]; [`orchestrator::Decaptcha`] walks
//! the chain until one provider returns an answer.

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod operator;
pub mod orchestrator;
pub mod provider;
pub mod state_machine;
pub mod ui;

pub use error::{DecaptchaError, DecodeError, ErrorKind, ProviderError};
pub use orchestrator::{Decaptcha, DecodeResult};
pub use provider::{AnyProvider, FeedbackHandle, PollOutcome, Provider, Ticket};
pub use state_machine::{AttemptRecord, RetryPolicy};
