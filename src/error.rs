use serde::Serialize;
use thiserror::Error;

use crate::http::TransportError;
use crate::state_machine::AttemptRecord;

/// Application-level errors raised outside the decode path (config, files).
#[derive(Debug, Error)]
pub enum DecaptchaError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown provider in chain: {0}")]
    UnknownProvider(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// The shared kind set every provider vocabulary is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SubmissionFailed,
    NotReadyYet,
    NoCapacity,
    InvalidCredentials,
    Unsolvable,
    UnsupportedImageFormat,
    ZeroOrOversizePayload,
    ZeroBalance,
    IpNotAllowed,
    UnexpectedResponse,
    OperationCanceled,
    Transport,
}

impl ErrorKind {
    /// Retryable kinds count against the poll budget without ending the attempt.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::NotReadyYet | ErrorKind::NoCapacity | ErrorKind::Transport
        )
    }

    /// Generic text used when a provider has nothing more specific to say.
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::SubmissionFailed => "submission failed",
            ErrorKind::NotReadyYet => "captcha is not recognized yet",
            ErrorKind::NoCapacity => "no idle workers are available at the moment",
            ErrorKind::InvalidCredentials => "credentials were rejected",
            ErrorKind::Unsolvable => "captcha could not be solved",
            ErrorKind::UnsupportedImageFormat => "image format is not supported",
            ErrorKind::ZeroOrOversizePayload => "image is empty or too large",
            ErrorKind::ZeroBalance => "account has zero or negative balance",
            ErrorKind::IpNotAllowed => "requests are not allowed from this IP",
            ErrorKind::UnexpectedResponse => "unexpected response",
            ErrorKind::OperationCanceled => "operation canceled",
            ErrorKind::Transport => "transport failure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::SubmissionFailed => "SubmissionFailed",
            ErrorKind::NotReadyYet => "NotReadyYet",
            ErrorKind::NoCapacity => "NoCapacity",
            ErrorKind::InvalidCredentials => "InvalidCredentials",
            ErrorKind::Unsolvable => "Unsolvable",
            ErrorKind::UnsupportedImageFormat => "UnsupportedImageFormat",
            ErrorKind::ZeroOrOversizePayload => "ZeroOrOversizePayload",
            ErrorKind::ZeroBalance => "ZeroBalance",
            ErrorKind::IpNotAllowed => "IPNotAllowed",
            ErrorKind::UnexpectedResponse => "UnexpectedResponse",
            ErrorKind::OperationCanceled => "OperationCanceled",
            ErrorKind::Transport => "TransportError",
        };
        f.write_str(name)
    }
}

/// A classified failure reported by one provider.
///
/// `message` keeps the provider's own wording; `kind` is what the state
/// machine acts on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{provider}: {message} ({kind})")]
pub struct ProviderError {
    pub provider: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, kind: ErrorKind) -> Self {
        Self::with_message(provider, kind, kind.default_message())
    }

    pub fn with_message(
        provider: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn transport(provider: impl Into<String>, err: &TransportError) -> Self {
        Self::with_message(provider, ErrorKind::Transport, err.to_string())
    }

    /// Looks `code` up in a provider's static vocabulary table.
    ///
    /// The first entry whose code occurs in `body` wins; `fallback` is used
    /// when nothing matches.
    pub fn from_table(
        provider: impl Into<String>,
        table: &[ErrorEntry],
        body: &str,
        fallback: ErrorKind,
    ) -> Self {
        match table.iter().find(|entry| body.contains(entry.code)) {
            Some(entry) => Self::with_message(provider, entry.kind, entry.message),
            None => Self::new(provider, fallback),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// One row of a provider's error vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct ErrorEntry {
    pub code: &'static str,
    pub kind: ErrorKind,
    pub message: &'static str,
}

/// Caller-visible failure of a whole decode request.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("No CAPTCHA providers configured")]
    NoProvidersConfigured,

    #[error("All providers exhausted, last error: {last}")]
    AllProvidersExhausted {
        last: ProviderError,
        attempts: Vec<AttemptRecord>,
    },
}

impl DecodeError {
    /// Kind of the error that ended the last attempt, if any ran.
    pub fn last_kind(&self) -> Option<ErrorKind> {
        match self {
            DecodeError::NoProvidersConfigured => None,
            DecodeError::AllProvidersExhausted { last, .. } => Some(last.kind),
        }
    }
}
