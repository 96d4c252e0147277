use crate::newsblur::types::{AddUrlReply, FeedSnapshot};
use crate::sync::FeedAdder;
use crate::util::{validate_service_host, UrlValidationError};
use futures::StreamExt;
use reqwest::header::{HeaderValue, COOKIE};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Name of the cookie NewsBlur reads the session from.
pub const SESSION_COOKIE: &str = "newsblur_sessionid";

/// The subscription payload grows with the account; cap it well above real sizes.
const MAX_FEEDS_SIZE: usize = 50 * 1024 * 1024; // 50MB
const MAX_REPLY_SIZE: usize = 5 * 1024 * 1024; // 5MB

#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid JSON in response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Session token cannot be sent as a cookie")]
    InvalidSessionToken,
    #[error("Invalid service host: {0}")]
    InvalidHost(#[from] UrlValidationError),
}

/// Snapshot parsed from `/reader/feeds`, together with the raw body for caching.
pub struct FeedsResponse {
    pub snapshot: FeedSnapshot,
    pub body: Vec<u8>,
}

/// Authenticated NewsBlur API client.
///
/// Cloning is cheap: the underlying `reqwest::Client` shares its pool.
#[derive(Clone)]
pub struct NewsBlurClient {
    http: reqwest::Client,
    host: String,
    session: Arc<SecretString>,
    timeout: Duration,
}

impl std::fmt::Debug for NewsBlurClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsBlurClient")
            .field("host", &self.host)
            .field("session", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl NewsBlurClient {
    /// Builds a client for `host`.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidHost`] when the host is not an https URL (plain http
    /// is accepted for localhost only).
    pub fn new(
        http: reqwest::Client,
        host: &str,
        session: SecretString,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let validated = validate_service_host(host)?;
        Ok(Self {
            http,
            host: validated.as_str().trim_end_matches('/').to_string(),
            session: Arc::new(session),
            timeout,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn cookie(&self) -> Result<HeaderValue, ApiError> {
        let mut value = HeaderValue::from_str(&format!(
            "{}={}",
            SESSION_COOKIE,
            self.session.expose_secret()
        ))
        .map_err(|_| ApiError::InvalidSessionToken)?;
        value.set_sensitive(true);
        Ok(value)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| ApiError::Timeout(self.timeout))??;

        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status().as_u16()));
        }
        Ok(response)
    }

    /// Fetches the account's current subscriptions.
    pub async fn fetch_feeds(&self) -> Result<FeedsResponse, ApiError> {
        let url = format!("{}/reader/feeds", self.host);
        tracing::debug!(url = %url, "Fetching subscription snapshot");

        let request = self.http.get(&url).header(COOKIE, self.cookie()?);
        let response = self.send(request).await?;
        let body = read_limited_bytes(response, MAX_FEEDS_SIZE).await?;
        let snapshot = FeedSnapshot::from_slice(&body)?;

        Ok(FeedsResponse { snapshot, body })
    }

    /// Subscribes to `feed_url`, filing it under `folder` when given.
    ///
    /// A `code: -1` body comes back as [`AddUrlReply::Rejected`], not as an error.
    pub async fn add_url(
        &self,
        feed_url: &str,
        folder: Option<&str>,
    ) -> Result<AddUrlReply, ApiError> {
        let url = format!("{}/reader/add_url", self.host);

        let mut form = reqwest::multipart::Form::new().text("url", feed_url.to_string());
        if let Some(folder) = folder {
            form = form.text("folder", folder.to_string());
        }

        let request = self
            .http
            .post(&url)
            .header(COOKIE, self.cookie()?)
            .multipart(form);
        let response = self.send(request).await?;
        let body = read_limited_bytes(response, MAX_REPLY_SIZE).await?;
        let body: serde_json::Value = serde_json::from_slice(&body)?;

        Ok(AddUrlReply::from_body(body))
    }
}

impl FeedAdder for NewsBlurClient {
    async fn add_feed(
        &self,
        feed_url: &str,
        folder: Option<&str>,
    ) -> Result<AddUrlReply, ApiError> {
        self.add_url(feed_url, folder).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ApiError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
