//! jsdati: drives the service's public demo web form.
//!
//! The upload answers with an HTML page whose inline script redirects to
//! `/index.php/demo/<id>`; the status endpoint returns JSON.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::{PollOutcome, Provider, Ticket};
use crate::error::{ErrorKind, ProviderError};
use crate::http::{HttpClient, Multipart};
use crate::state_machine::{Job, RetryPolicy};

pub const NAME: &str = "jsdati";
pub const DEFAULT_BASE_URL: &str = "http://www.jsdati.com";

pub const POLICY: RetryPolicy = RetryPolicy::from_secs(10, 5, 6);

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// All three fields must be present; `result` may be a string or a number.
#[derive(Debug, Clone, Deserialize)]
pub struct DemoResult {
    pub status: Value,
    pub result: Value,
    pub damaworker: Value,
}

impl DemoResult {
    pub fn answer(&self) -> String {
        match &self.result {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Jsdati {
    http: HttpClient,
    username: String,
    password: String,
    base_url: String,
    redirect: Regex,
    policy: RetryPolicy,
}

impl Jsdati {
    pub fn new(http: HttpClient, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_base_url(http, username, password, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        http: HttpClient,
        username: impl Into<String>,
        password: impl Into<String>,
        base_url: &str,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            http,
            username: username.into(),
            password: password.into(),
            redirect: redirect_pattern(&base_url),
            base_url,
            policy: POLICY,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn referer(&self) -> String {
        format!("{}/index.php/demo", self.base_url)
    }

    /// Pulls the job id out of the post-upload redirect script.
    pub fn parse_upload(&self, body: &str) -> Result<Ticket, ProviderError> {
        match self.redirect.captures(body) {
            Some(caps) => Ok(Ticket::new(&caps[1])),
            None => Err(ProviderError::with_message(
                NAME,
                ErrorKind::Unsolvable,
                "upload page carried no job redirect",
            )),
        }
    }
}

fn redirect_pattern(base_url: &str) -> Regex {
    let pattern = format!(
        r"window\.location\.href='{}/index\.php/demo/([0-9]+)'",
        regex::escape(base_url)
    );
    Regex::new(&pattern).expect("escaped base url forms a valid regex")
}

/// Reads one status response.
pub fn parse_result(body: &[u8]) -> PollOutcome {
    match serde_json::from_slice::<DemoResult>(body) {
        Ok(status) => match status.answer() {
            text if text.is_empty() => PollOutcome::Pending,
            text => PollOutcome::Solved(text),
        },
        Err(e) => PollOutcome::Fatal(ProviderError::with_message(
            NAME,
            ErrorKind::Unsolvable,
            format!("unreadable status response: {e}"),
        )),
    }
}

impl Provider for Jsdati {
    fn name(&self) -> &str {
        NAME
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn submit(&self, job: &Job) -> Result<Ticket, ProviderError> {
        let form = Multipart::new()
            .text("user_name", &self.username)
            .text("user_pw", &self.password)
            .image("user_yzm", job.image())
            .text("pesubmit", "");

        let referer = self.referer();
        let headers = [
            ("referer", referer.as_str()),
            ("accept", ACCEPT_HTML),
            ("accept-language", "en-us"),
        ];
        let response = self
            .http
            .post_multipart(&referer, &headers, form)
            .await
            .map_err(|e| ProviderError::transport(NAME, &e))?;
        self.parse_upload(&response.text())
    }

    async fn poll(&self, ticket: &Ticket) -> PollOutcome {
        let url = format!(
            "{}/index.php?mod=demo&act=result&id={ticket}",
            self.base_url
        );
        let referer = format!("{}/{ticket}", self.referer());
        match self.http.get(&url, &[("referer", referer.as_str())]).await {
            Ok(response) => parse_result(&response.body),
            Err(e) => PollOutcome::Retryable(ProviderError::transport(NAME, &e)),
        }
    }
}
