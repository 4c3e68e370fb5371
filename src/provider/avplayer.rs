//! avplayer: free recognizer behind a raw TCP exchange.
//!
//! One connection per image: access line, big-endian length prefix, image,
//! then the answer is read until the server closes. Because the answer comes
//! back inline, submit hands it over as the ticket and the single poll reports
//! it as solved.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::{PollOutcome, Provider, Ticket};
use crate::error::{ErrorKind, ProviderError};
use crate::http::TransportError;
use crate::state_machine::{Job, RetryPolicy};

pub const NAME: &str = "avplayer";
pub const DEFAULT_ADDR: &str = "avlog.avplayer.org:8013";

/// No waiting: the answer is already known when the only poll happens.
pub const POLICY: RetryPolicy = RetryPolicy::from_secs(0, 0, 1);

const ACCESS_LINE: &[u8; 33] = b"3bc49260524f3d1a5e535e8ac785766b\n";
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Avplayer {
    addr: String,
    timeout: Duration,
}

impl Default for Avplayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Avplayer {
    pub fn new() -> Self {
        Self::with_addr(DEFAULT_ADDR)
    }

    /// `addr` is `host:port`.
    pub fn with_addr(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: EXCHANGE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn exchange(&self, image: &[u8]) -> Result<Vec<u8>, TransportError> {
        let length = u32::try_from(image.len()).map_err(|_| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "image larger than 4 GiB",
            ))
        })?;

        let mut stream = TcpStream::connect(&self.addr).await?;
        debug!(addr = %self.addr, bytes = image.len(), "connected");

        stream.write_all(ACCESS_LINE).await?;
        let mut frame = Vec::with_capacity(4 + image.len());
        frame.extend_from_slice(&length.to_be_bytes());
        frame.extend_from_slice(image);
        stream.write_all(&frame).await?;
        stream.flush().await?;

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await?;
        Ok(reply)
    }
}

/// Reads the raw reply into an answer.
pub fn parse_reply(reply: &[u8]) -> Result<Ticket, ProviderError> {
    let answer = String::from_utf8_lossy(reply).trim().to_string();
    if answer.is_empty() {
        return Err(ProviderError::with_message(
            NAME,
            ErrorKind::UnexpectedResponse,
            "server closed without an answer",
        ));
    }
    Ok(Ticket::new(answer))
}

impl Provider for Avplayer {
    fn name(&self) -> &str {
        NAME
    }

    fn retry_policy(&self) -> RetryPolicy {
        POLICY
    }

    async fn submit(&self, job: &Job) -> Result<Ticket, ProviderError> {
        let reply = tokio::time::timeout(self.timeout, self.exchange(job.image()))
            .await
            .map_err(|_| ProviderError::transport(NAME, &TransportError::Timeout(self.timeout)))?
            .map_err(|e| ProviderError::transport(NAME, &e))?;
        parse_reply(&reply)
    }

    async fn poll(&self, ticket: &Ticket) -> PollOutcome {
        PollOutcome::Solved(ticket.as_str().to_string())
    }
}
