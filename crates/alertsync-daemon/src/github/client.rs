//! GitHub REST client plumbing.
//!
//! One thin HTTP client shared by every ledger operation. Transport-level
//! timeouts are enforced here, per request; the engine treats a timeout as
//! an ordinary ledger failure. Rate-limit and authentication responses are
//! mapped to their own [`LedgerError`] variants so callers can tell them
//! apart from plain API rejections.

use std::time::Duration;

use alertsync_core::LedgerError;
use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Maximum bytes of an error response body carried into an error message.
const MAX_ERROR_BODY_LEN: usize = 512;

/// HTTP client for the GitHub REST API.
pub struct GitHubClient {
    http: HttpsClient,
    api_base_url: String,
    api_token: Option<SecretString>,
    timeout: Duration,
}

impl GitHubClient {
    /// Creates a client for the given API base URL.
    #[must_use]
    pub fn new(
        api_base_url: impl Into<String>,
        api_token: Option<SecretString>,
        timeout: Duration,
    ) -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let http: HttpsClient = Client::builder(TokioExecutor::new()).build(https);

        Self {
            http,
            api_base_url: api_base_url.into(),
            api_token,
            timeout,
        }
    }

    /// Sends one request and returns the successful response body.
    ///
    /// `path_and_query` is appended to the base URL and must begin with
    /// `/`.
    pub(crate) async fn request(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<(StatusCode, Bytes), LedgerError> {
        let url = format!(
            "{}{path_and_query}",
            self.api_base_url.trim_end_matches('/')
        );

        let mut request = Request::builder()
            .method(method.clone())
            .uri(&url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "alertsync-daemon/0.3")
            .header("X-GitHub-Api-Version", "2022-11-28");

        if body.is_some() {
            request = request.header("Content-Type", "application/json");
        }
        if let Some(token) = &self.api_token {
            request = request.header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let body_bytes = match body {
            Some(value) => serde_json::to_vec(value)
                .map_err(|e| LedgerError::Network(e.to_string()))?,
            None => Vec::new(),
        };
        let request = request
            .body(Full::new(Bytes::from(body_bytes)))
            .map_err(|e| LedgerError::Network(e.to_string()))?;

        debug!(%method, url = %url, "sending GitHub API request");

        let response = tokio::time::timeout(self.timeout, self.http.request(request))
            .await
            .map_err(|_| {
                LedgerError::Network(format!(
                    "request timed out after {}s: {url}",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| LedgerError::Network(e.to_string()))?;

        let status_code = response.status();

        // Rate limiting surfaces on 403 and 429 with a Retry-After hint.
        if status_code == StatusCode::FORBIDDEN || status_code == StatusCode::TOO_MANY_REQUESTS {
            let retry_after: u64 = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(LedgerError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status_code == StatusCode::UNAUTHORIZED {
            return Err(LedgerError::Authentication(
                "GitHub API authentication failed, check API token".to_string(),
            ));
        }

        let bytes = response
            .into_body()
            .collect()
            .await
            .map(http_body_util::Collected::to_bytes)
            .map_err(|e| LedgerError::Network(e.to_string()))?;

        if !status_code.is_success() {
            let mut message = String::from_utf8_lossy(&bytes).into_owned();
            message.truncate(MAX_ERROR_BODY_LEN);
            if message.is_empty() {
                message = format!("HTTP {status_code}");
            }
            return Err(LedgerError::Api {
                message,
                status_code: Some(status_code.as_u16()),
            });
        }

        Ok((status_code, bytes))
    }

    /// Sends one request and parses the response body as JSON.
    pub(crate) async fn request_json(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, LedgerError> {
        let (_, bytes) = self.request(method, path_and_query, body).await?;
        serde_json::from_slice(&bytes).map_err(|e| LedgerError::InvalidResponse(e.to_string()))
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the token.
        f.debug_struct("GitHubClient")
            .field("api_base_url", &self.api_base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Percent-encodes a string for use in a URL query component.
///
/// Unreserved characters (RFC 3986) pass through; everything else is
/// `%XX`-encoded.
#[must_use]
pub(crate) fn encode_query(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            },
            _ => {
                encoded.push('%');
                encoded.push_str(&format!("{byte:02X}"));
            },
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_query_passes_unreserved() {
        assert_eq!(encode_query("abc-XYZ_0.9~"), "abc-XYZ_0.9~");
    }

    #[test]
    fn test_encode_query_escapes_reserved() {
        assert_eq!(encode_query("a b"), "a%20b");
        assert_eq!(encode_query("repo:o/r"), "repo%3Ao%2Fr");
        assert_eq!(encode_query("\"Alert ID: 7\""), "%22Alert%20ID%3A%207%22");
    }

    #[test]
    fn test_encode_query_escapes_multibyte() {
        assert_eq!(encode_query("🚨"), "%F0%9F%9A%A8");
    }

    #[test]
    fn test_client_debug_omits_token() {
        let client = GitHubClient::new(
            "https://api.github.com",
            Some(SecretString::from("ghp_supersecret".to_string())),
            Duration::from_secs(5),
        );
        let debug = format!("{client:?}");
        assert!(!debug.contains("ghp_supersecret"));
        assert!(debug.contains("api.github.com"));
    }
}
