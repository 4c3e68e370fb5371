//! Transport-level failures shared by every adapter.
//!
//! [`TransportError`] wraps whatever the network collaborator reports. Adapters
//! never decide on these themselves: while polling they are always retryable
//! until the attempt's poll budget runs out.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Failure inside reqwest (DNS, connect, TLS, body read).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failure on a raw socket.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),
}
