//! hydati: plain-text REST service.
//!
//! Errors come back as free-form text prefixed with `#`, e.g. `#答题超时`.

use std::sync::LazyLock;

use regex::Regex;

use super::{FeedbackHandle, PollOutcome, Provider, Ticket};
use crate::error::{ErrorKind, ProviderError};
use crate::http::{HttpClient, Multipart};
use crate::state_machine::{Job, RetryPolicy};

pub const NAME: &str = "hydati";
pub const DEFAULT_BASE_URL: &str = "http://dt1.hydati.com:8080";

pub const POLICY: RetryPolicy = RetryPolicy::from_secs(5, 2, 6);

const DATI_TYPE: &str = "1000";
const SOLVE_TIMEOUT_SECS: &str = "40";
const HINT: &str = "四个字母 不区分大小写";

static TICKET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d+)").expect("valid regex"));
static LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]+$").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct Hydati {
    http: HttpClient,
    key: String,
    base_url: String,
    policy: RetryPolicy,
}

impl Hydati {
    pub fn new(http: HttpClient, key: impl Into<String>) -> Self {
        Self::with_base_url(http, key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(http: HttpClient, key: impl Into<String>, base_url: &str) -> Self {
        Self {
            http,
            key: key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            policy: POLICY,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

fn service_message(body: &str) -> Option<&str> {
    body.strip_prefix('#').map(str::trim)
}

pub fn parse_upload(body: &str) -> Result<Ticket, ProviderError> {
    if let Some(message) = service_message(body) {
        return Err(ProviderError::with_message(
            NAME,
            ErrorKind::SubmissionFailed,
            message,
        ));
    }
    match TICKET.captures(body) {
        Some(caps) => Ok(Ticket::new(&caps[1])),
        None => Err(ProviderError::with_message(
            NAME,
            ErrorKind::SubmissionFailed,
            format!("unexpected upload response: {body:?}"),
        )),
    }
}

/// Empty means a worker is still typing; unknown text is treated the same.
pub fn parse_answer(body: &str) -> PollOutcome {
    let body = body.trim();
    if let Some(message) = service_message(body) {
        return PollOutcome::Fatal(ProviderError::with_message(
            NAME,
            ErrorKind::Unsolvable,
            message,
        ));
    }
    if LETTERS.is_match(body) {
        PollOutcome::Solved(body.to_string())
    } else {
        PollOutcome::Pending
    }
}

impl Provider for Hydati {
    fn name(&self) -> &str {
        NAME
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn submit(&self, job: &Job) -> Result<Ticket, ProviderError> {
        let form = Multipart::new()
            .text("dati_type", DATI_TYPE)
            .text("acc_str", &self.key)
            .text("timeout", SOLVE_TIMEOUT_SECS)
            .image("pic", job.image())
            .text("extra_str", HINT);

        let url = format!("{}/uploadpic.php", self.base_url);
        let response = self
            .http
            .post_multipart(&url, &[], form)
            .await
            .map_err(|e| ProviderError::transport(NAME, &e))?;
        parse_upload(&response.text())
    }

    async fn poll(&self, ticket: &Ticket) -> PollOutcome {
        let url = format!("{}/query.php?sid={ticket}", self.base_url);
        match self.http.get(&url, &[]).await {
            Ok(response) => parse_answer(&response.text()),
            Err(e) => PollOutcome::Retryable(ProviderError::transport(NAME, &e)),
        }
    }

    fn feedback(&self, ticket: &Ticket) -> Option<FeedbackHandle> {
        let http = self.http.clone();
        let url = format!(
            "{}/response.php?action=error&auth_code={}&sid={ticket}",
            self.base_url, self.key
        );
        Some(FeedbackHandle::new(NAME, async move {
            http.get(&url, &[]).await.map(|_| ())
        }))
    }
}
