//! antigate: human relay service with a priority queue.
//!
//! Upload: `POST {host}in.php` → `OK|<id>` or an `ERROR_*` code.
//! Status: `GET {host}res.php?key=K&action=get&id=ID` → `CAPCHA_NOT_READY`,
//! `OK|<answer>` or an `ERROR_*` code.
//! Report: `GET {host}res.php?key=K&action=reportbad&id=ID`.

use std::sync::LazyLock;

use regex::Regex;

use super::{FeedbackHandle, PollOutcome, Provider, Ticket};
use crate::error::{ErrorEntry, ErrorKind, ProviderError};
use crate::http::{HttpClient, Multipart};
use crate::state_machine::{Job, RetryPolicy};

pub const NAME: &str = "antigate";
pub const DEFAULT_HOST: &str = "http://antigate.com/";

/// First poll 15 s after upload, then every 5 s, six polls in total.
pub const POLICY: RetryPolicy = RetryPolicy::from_secs(15, 5, 6);

const NOT_READY: &str = "CAPCHA_NOT_READY";

static UPLOAD_OK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"OK\|([0-9]+)").expect("valid regex"));
static ANSWER_OK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"OK\|([0-9a-zA-Z]+)").expect("valid regex"));

pub const ERRORS: &[ErrorEntry] = &[
    ErrorEntry {
        code: "ERROR_CAPCHA_NOT_READY",
        kind: ErrorKind::NotReadyYet,
        message: "captcha is not recognized yet, repeat request withing 1-5 seconds",
    },
    ErrorEntry {
        code: "ERROR_WRONG_USER_KEY",
        kind: ErrorKind::InvalidCredentials,
        message: "user authorization key is invalid (its length is not 32 bytes as it should be)",
    },
    ErrorEntry {
        code: "ERROR_KEY_DOES_NOT_EXIST",
        kind: ErrorKind::InvalidCredentials,
        message: "you have set wrong user authorization key in request",
    },
    ErrorEntry {
        code: "ERROR_NO_SLOT_AVAILABLE",
        kind: ErrorKind::NoCapacity,
        message: "no idle captcha workers are available at the moment, please try a bit later or try increasing your bid",
    },
    ErrorEntry {
        code: "ERROR_ZERO_CAPTCHA_FILESIZE",
        kind: ErrorKind::ZeroOrOversizePayload,
        message: "the size of the captcha you are uploading is zero",
    },
    ErrorEntry {
        code: "ERROR_TOO_BIG_CAPTCHA_FILESIZE",
        kind: ErrorKind::ZeroOrOversizePayload,
        message: "your captcha size is exceeding 100kb limit",
    },
    ErrorEntry {
        code: "ERROR_ZERO_BALANCE",
        kind: ErrorKind::ZeroBalance,
        message: "account has zero or negative balance",
    },
    ErrorEntry {
        code: "ERROR_IP_NOT_ALLOWED",
        kind: ErrorKind::IpNotAllowed,
        message: "Request with current account key is not allowed from your IP. Please refer to IP list section",
    },
    ErrorEntry {
        code: "ERROR_CAPTCHA_UNSOLVABLE",
        kind: ErrorKind::Unsolvable,
        message: "Could not solve captcha in 6 attempts by different workers",
    },
    ErrorEntry {
        code: "ERROR_BAD_DUPLICATES",
        kind: ErrorKind::Unsolvable,
        message: "100% recognition feature failed due to attempts limit",
    },
    ErrorEntry {
        code: "ERROR_NO_SUCH_METHOD",
        kind: ErrorKind::UnexpectedResponse,
        message: "You must send method parameter in your API request, please refer to the API documentation",
    },
    ErrorEntry {
        code: "ERROR_IMAGE_TYPE_NOT_SUPPORTED",
        kind: ErrorKind::UnsupportedImageFormat,
        message: "Could not determine captcha file type, only allowed formats are JPG, GIF, PNG",
    },
];

#[derive(Debug, Clone)]
pub struct Antigate {
    http: HttpClient,
    key: String,
    host: String,
    policy: RetryPolicy,
}

impl Antigate {
    pub fn new(http: HttpClient, key: impl Into<String>) -> Self {
        Self::with_host(http, key, DEFAULT_HOST)
    }

    /// Points the adapter at another antigate-compatible host.
    pub fn with_host(http: HttpClient, key: impl Into<String>, host: &str) -> Self {
        let mut host = host.to_string();
        if !host.ends_with('/') {
            host.push('/');
        }
        Self {
            http,
            key: key.into(),
            host,
            policy: POLICY,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn res_url(&self, action: &str, ticket: &Ticket) -> String {
        format!(
            "{}res.php?key={}&action={action}&id={ticket}",
            self.host, self.key
        )
    }
}

/// Reads the upload response into a ticket.
pub fn parse_upload(body: &str) -> Result<Ticket, ProviderError> {
    match UPLOAD_OK.captures(body) {
        Some(caps) => Ok(Ticket::new(&caps[1])),
        None => Err(classify_error(body)),
    }
}

/// Reads one `res.php?action=get` response.
pub fn parse_answer(body: &str) -> PollOutcome {
    let body = body.trim();
    if body == NOT_READY {
        return PollOutcome::Pending;
    }
    if let Some(caps) = ANSWER_OK.captures(body) {
        return PollOutcome::Solved(caps[1].to_string());
    }
    // A worker who gave up submits nothing.
    if body == "OK|" {
        return PollOutcome::Fatal(ProviderError::with_message(
            NAME,
            ErrorKind::Unsolvable,
            "worker returned an empty answer",
        ));
    }
    PollOutcome::from_error(classify_error(body))
}

/// Anything outside the known vocabulary is treated as unsolvable.
pub fn classify_error(body: &str) -> ProviderError {
    ProviderError::from_table(NAME, ERRORS, body, ErrorKind::Unsolvable)
}

impl Provider for Antigate {
    fn name(&self) -> &str {
        NAME
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn submit(&self, job: &Job) -> Result<Ticket, ProviderError> {
        let form = Multipart::new()
            .text("method", "post")
            .text("key", &self.key)
            .text("regsense", "0")
            .image("file", job.image());

        let url = format!("{}in.php", self.host);
        let response = self
            .http
            .post_multipart(&url, &[], form)
            .await
            .map_err(|e| ProviderError::transport(NAME, &e))?;
        parse_upload(&response.text())
    }

    async fn poll(&self, ticket: &Ticket) -> PollOutcome {
        match self.http.get(&self.res_url("get", ticket), &[]).await {
            Ok(response) => parse_answer(&response.text()),
            Err(e) => PollOutcome::Retryable(ProviderError::transport(NAME, &e)),
        }
    }

    fn feedback(&self, ticket: &Ticket) -> Option<FeedbackHandle> {
        let http = self.http.clone();
        let url = self.res_url("reportbad", ticket);
        Some(FeedbackHandle::new(NAME, async move {
            http.get(&url, &[]).await.map(|_| ())
        }))
    }
}
