use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tracing::{debug, warn};

use crate::http::TransportError;

type ReportFuture = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send>>;

/// Deferred "that answer was wrong" notification for one solved ticket.
///
/// Bound to the ticket and credentials at the moment of success. Invoking it
/// is fire-and-forget: the outcome of the notification never reaches the
/// caller.
pub struct FeedbackHandle {
    provider: String,
    report: ReportFuture,
}

impl FeedbackHandle {
    pub fn new<F>(provider: impl Into<String>, report: F) -> Self
    where
        F: Future<Output = Result<(), TransportError>> + Send + 'static,
    {
        Self {
            provider: provider.into(),
            report: Box::pin(report),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Sends the report in the background.
    ///
    /// Outside a tokio runtime the report is dropped with a warning.
    pub fn report(self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(self.send());
            }
            Err(_) => warn!(provider = %self.provider, "no runtime, wrong-answer report dropped"),
        }
    }

    /// Sends the report and waits for it to finish, ignoring its result.
    pub async fn send(self) {
        match self.report.await {
            Ok(()) => debug!(provider = %self.provider, "wrong-answer report sent"),
            Err(e) => warn!(provider = %self.provider, error = %e, "wrong-answer report failed"),
        }
    }
}

impl fmt::Debug for FeedbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedbackHandle")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}
