//! deathbycaptcha: REST API answering in JSON.
//!
//! The upload is answered with `303 See Other`; the `Location` header is the
//! status resource and doubles as the ticket. The redirect body already holds
//! the status, which is final when the image was solved before.

use serde::Deserialize;

use super::{FeedbackHandle, PollOutcome, Provider, Ticket};
use crate::error::{ErrorKind, ProviderError};
use crate::http::{HttpClient, HttpResponse, Multipart};
use crate::state_machine::{Job, RetryPolicy};

pub const NAME: &str = "deathbycaptcha";
pub const DEFAULT_BASE_URL: &str = "http://api.dbcapi.me";

/// 11 s matches the service's average solve time; then every 3 s.
pub const POLICY: RetryPolicy = RetryPolicy::from_secs(11, 3, 21);

const ACCEPT_JSON: (&str, &str) = ("accept", "application/json");

/// Body of `GET /api/captcha/<id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaStatus {
    #[serde(default)]
    pub captcha: Option<u64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub struct DeathByCaptcha {
    http: HttpClient,
    username: String,
    password: String,
    base_url: String,
    policy: RetryPolicy,
}

impl DeathByCaptcha {
    pub fn new(http: HttpClient, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_base_url(http, username, password, DEFAULT_BASE_URL)
    }

    /// Create an adapter pointing at a custom base URL (useful for testing).
    pub fn with_base_url(
        http: HttpClient,
        username: impl Into<String>,
        password: impl Into<String>,
        base_url: &str,
    ) -> Self {
        Self {
            http,
            username: username.into(),
            password: password.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            policy: POLICY,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Only a redirect to the status resource counts as an accepted upload.
pub fn parse_upload(response: &HttpResponse) -> Result<Ticket, ProviderError> {
    match (response.status, &response.location) {
        (303, Some(location)) if !location.is_empty() => Ok(Ticket::new(location.clone())),
        (303, _) => Err(ProviderError::with_message(
            NAME,
            ErrorKind::UnexpectedResponse,
            "upload redirect carried no Location",
        )),
        (403, _) => Err(ProviderError::with_message(
            NAME,
            ErrorKind::InvalidCredentials,
            "access denied: bad credentials or insufficient balance",
        )),
        (400, _) => Err(ProviderError::with_message(
            NAME,
            ErrorKind::UnsupportedImageFormat,
            "captcha image was rejected",
        )),
        (503, _) => Err(ProviderError::with_message(
            NAME,
            ErrorKind::NoCapacity,
            "service is overloaded",
        )),
        (status, _) => Err(ProviderError::with_message(
            NAME,
            ErrorKind::SubmissionFailed,
            format!("upload answered with HTTP {status}"),
        )),
    }
}

/// Relative `Location` values are resolved against the API base URL.
pub fn resolve_location(base_url: &str, location: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        location.to_string()
    } else {
        format!("{}/{}", base_url, location.trim_start_matches('/'))
    }
}

/// Anything short of a correct, non-empty answer means "keep polling".
pub fn parse_status(body: &[u8]) -> PollOutcome {
    match serde_json::from_slice::<CaptchaStatus>(body) {
        Ok(CaptchaStatus {
            text: Some(text),
            is_correct: true,
            ..
        }) if !text.is_empty() => PollOutcome::Solved(text),
        _ => PollOutcome::Pending,
    }
}

impl Provider for DeathByCaptcha {
    fn name(&self) -> &str {
        NAME
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn submit(&self, job: &Job) -> Result<Ticket, ProviderError> {
        let form = Multipart::new()
            .text("username", &self.username)
            .text("password", &self.password)
            .image("captchafile", job.image());

        let url = format!("{}/api/captcha", self.base_url);
        let response = self
            .http
            .post_multipart(&url, &[ACCEPT_JSON], form)
            .await
            .map_err(|e| ProviderError::transport(NAME, &e))?;
        let location = parse_upload(&response)?;
        let ticket = Ticket::new(resolve_location(&self.base_url, location.as_str()));
        match parse_status(&response.body) {
            PollOutcome::Solved(text) => Ok(ticket.with_answer(text)),
            _ => Ok(ticket),
        }
    }

    async fn poll(&self, ticket: &Ticket) -> PollOutcome {
        if let Some(text) = ticket.answer() {
            return PollOutcome::Solved(text.to_string());
        }
        match self.http.get(ticket.as_str(), &[ACCEPT_JSON]).await {
            Ok(response) => parse_status(&response.body),
            Err(e) => PollOutcome::Retryable(ProviderError::transport(NAME, &e)),
        }
    }

    fn feedback(&self, ticket: &Ticket) -> Option<FeedbackHandle> {
        let http = self.http.clone();
        let url = format!("{}/report", ticket.as_str().trim_end_matches('/'));
        let form = Multipart::new()
            .text("username", &self.username)
            .text("password", &self.password);
        Some(FeedbackHandle::new(NAME, async move {
            http.post_multipart(&url, &[ACCEPT_JSON], form)
                .await
                .map(|_| ())
        }))
    }
}
