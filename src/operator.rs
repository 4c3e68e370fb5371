//! Line-based operator console for the channel_friend relay.
//!
//! One [`Console`] owns the input for the whole run: it answers relay
//! questions while the chain decodes and then reads the confirmation, so no
//! line typed by the operator is lost between the two.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::provider::{RelayInbox, RelayMessage};

pub struct Console<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> Console<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Answers questions from `inbox` until `stop` fires or the relay closes.
    ///
    /// `on_message` sees every relay message before a line is read for it.
    /// An empty line declines the question. Both waits are cancel safe: a
    /// line that arrives after `stop` stays buffered for the next read.
    pub async fn serve<F>(&mut self, inbox: &mut RelayInbox, stop: &CancellationToken, mut on_message: F)
    where
        F: FnMut(&RelayMessage),
    {
        loop {
            let message = tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                message = inbox.recv() => match message {
                    Some(message) => message,
                    None => return,
                },
            };
            on_message(&message);

            let RelayMessage::Question(question) = message else {
                continue;
            };
            let line = tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                line = self.lines.next_line() => line,
            };
            let accepted = match line {
                Ok(Some(line)) if !line.trim().is_empty() => inbox.answer(question.id, line.trim()),
                Ok(_) => inbox.decline(question.id),
                Err(e) => {
                    warn!(error = %e, "operator input failed");
                    inbox.decline(question.id)
                }
            };
            if !accepted {
                debug!(id = question.id, "question withdrawn before the operator replied");
            }
        }
    }

    /// Reads a yes/no reply. Only an explicit "n" counts as no; end of
    /// input counts as yes.
    pub async fn confirm(&mut self) -> io::Result<bool> {
        let reply = self.lines.next_line().await?.unwrap_or_default();
        Ok(!reply.trim().eq_ignore_ascii_case("n"))
    }
}
