use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::error::{DecodeError, ErrorKind, ProviderError};
use crate::provider::{AnyProvider, FeedbackHandle, Provider};
use crate::state_machine::{run_attempt, AttemptOutcome, AttemptRecord, Job};

/// A successful decode.
#[derive(Debug)]
pub struct DecodeResult {
    /// Name of the provider whose answer was accepted.
    pub provider: String,
    pub text: String,
    /// Reports the answer as wrong, if the provider supports it.
    pub feedback: Option<FeedbackHandle>,
    /// One record per attempt, in the order they ran.
    pub attempts: Vec<AttemptRecord>,
}

/// Runs a decode request across an ordered chain of providers.
///
/// Providers are tried strictly one at a time in the order given; the first
/// solved attempt wins and the rest of the chain is never touched. The chain
/// itself is never mutated, so one value can serve concurrent requests.
pub struct Decaptcha<P: Provider = AnyProvider> {
    providers: Vec<P>,
    cancel: CancellationToken,
}

impl<P: Provider> Decaptcha<P> {
    pub fn new(providers: Vec<P>) -> Self {
        Self::with_cancellation(providers, CancellationToken::new())
    }

    /// Every in-flight and future decode stops once `cancel` fires.
    pub fn with_cancellation(providers: Vec<P>, cancel: CancellationToken) -> Self {
        Self { providers, cancel }
    }

    pub fn providers(&self) -> &[P] {
        &self.providers
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn decode(&self, image: impl Into<Vec<u8>>) -> Result<DecodeResult, DecodeError> {
        if self.providers.is_empty() {
            return Err(DecodeError::NoProvidersConfigured);
        }

        let job = Job::new(image);
        let span = info_span!("decode", request_id = %job.id);
        self.walk_chain(&job).instrument(span).await
    }

    async fn walk_chain(&self, job: &Job) -> Result<DecodeResult, DecodeError> {
        info!(providers = self.providers.len(), bytes = job.image().len(), "decode started");
        let mut attempts = Vec::with_capacity(self.providers.len());
        let mut last = None;

        for provider in &self.providers {
            if self.cancel.is_cancelled() {
                last = Some(canceled(provider.name()));
                break;
            }

            let span = info_span!("attempt", provider = provider.name());
            let report = run_attempt(provider, job, &self.cancel)
                .instrument(span)
                .await;
            attempts.push(report.record);

            match report.outcome {
                AttemptOutcome::Solved { text, feedback } => {
                    info!(provider = provider.name(), "decode solved");
                    return Ok(DecodeResult {
                        provider: provider.name().to_string(),
                        text,
                        feedback,
                        attempts,
                    });
                }
                AttemptOutcome::Exhausted(err) | AttemptOutcome::Fatal(err) => {
                    let stop = err.kind == ErrorKind::OperationCanceled;
                    last = Some(err);
                    if stop {
                        break;
                    }
                }
            }
        }

        let last = last.unwrap_or_else(|| canceled("decaptcha"));
        warn!(error = %last, attempts = attempts.len(), "all providers exhausted");
        Err(DecodeError::AllProvidersExhausted { last, attempts })
    }
}

fn canceled(provider: &str) -> ProviderError {
    ProviderError::new(provider, ErrorKind::OperationCanceled)
}
