use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, CONTENT_TYPE, LOCATION};
use reqwest::{redirect, Client, Method, Url};
use tracing::debug;

use super::error::TransportError;
use super::multipart::Multipart;

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Value of the `Location` header, when present.
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Thin request/response wrapper shared by all HTTP adapters.
///
/// Idle pooling is disabled and every request says `Connection: close`, so
/// each submit or poll runs on its own connection. Redirects are surfaced to
/// the caller instead of being followed.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeouts(Duration::from_secs(10), Duration::from_secs(60))
    }

    pub fn with_timeouts(connect: Duration, total: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(connect)
            .timeout(total)
            .pool_max_idle_per_host(0)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    pub async fn get(
        &self,
        url: &str,
        headers: &[(&'static str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        self.send(Method::GET, url, headers, None).await
    }

    pub async fn post_multipart(
        &self,
        url: &str,
        headers: &[(&'static str, &str)],
        form: Multipart,
    ) -> Result<HttpResponse, TransportError> {
        let content_type = form.content_type();
        self.send(Method::POST, url, headers, Some((content_type, form.into_body())))
            .await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &[(&'static str, &str)],
        body: Option<(String, Vec<u8>)>,
    ) -> Result<HttpResponse, TransportError> {
        let url = Url::parse(url).map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;
        debug!(%method, %url, "sending request");

        let mut header_map = HeaderMap::new();
        header_map.insert(CONNECTION, HeaderValue::from_static("close"));
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidHeader(format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidHeader(format!("{name}: {e}")))?;
            header_map.insert(name, value);
        }

        let mut request = self.client.request(method, url).headers(header_map);
        if let Some((content_type, bytes)) = body {
            request = request.header(CONTENT_TYPE, content_type).body(bytes);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();
        debug!(status, bytes = body.len(), "response received");

        Ok(HttpResponse {
            status,
            location,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_helpers() {
        let resp = HttpResponse {
            status: 200,
            location: None,
            body: b"OK|123".to_vec(),
        };
        assert_eq!(resp.text(), "OK|123");
    }

    #[tokio::test]
    async fn invalid_url_is_reported() {
        let client = HttpClient::new().unwrap();
        let err = client.get("not a url", &[]).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let client =
            HttpClient::with_timeouts(Duration::from_millis(200), Duration::from_millis(500))
                .unwrap();
        let err = client.get("http://127.0.0.1:9/", &[]).await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
    }
}
