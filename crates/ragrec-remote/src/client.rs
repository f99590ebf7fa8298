//! Shared HTTP plumbing for the remote adapters.

use std::time::Duration;

use ragrec_core::{EmbedError, Error, GenerateError, RerankError};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Connection settings for one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    /// Base URL, e.g. `http://localhost:8000/v1`
    pub base_url: String,
    /// Model name sent with every request
    pub model: String,
    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl EndpointSettings {
    /// Settings with no API key and a 60 second timeout.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Full URL for `path` under the base URL.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Build a client carrying the JSON content type and optional bearer token.
pub fn build_client(settings: &EndpointSettings) -> Result<Client, Error> {
    if settings.model.trim().is_empty() {
        return Err(Error::Config(format!(
            "missing model name for {}",
            settings.base_url
        )));
    }

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = settings.api_key.as_deref().map(str::trim)
        && !key.is_empty()
    {
        let value = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| Error::Config(format!("invalid API key: {e}")))?;
        headers.insert(AUTHORIZATION, value);
    }

    Client::builder()
        .timeout(settings.timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))
}

/// Why a remote call failed.
#[derive(Debug)]
pub enum HttpFailure {
    /// The request never produced a response
    Transport(String),
    /// The endpoint answered with a non-success status
    Status { status: StatusCode, body: String },
    /// The response body was not the expected JSON
    Decode(String),
}

impl std::fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) | Self::Decode(msg) => f.write_str(msg),
            Self::Status { status, body } => write!(f, "endpoint returned {status}: {body}"),
        }
    }
}

impl From<HttpFailure> for EmbedError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Decode(_) => Self::InvalidResponse(failure.to_string()),
            _ => Self::Request(failure.to_string()),
        }
    }
}

impl From<HttpFailure> for RerankError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Decode(_) => Self::InvalidResponse(failure.to_string()),
            _ => Self::Request(failure.to_string()),
        }
    }
}

impl From<HttpFailure> for GenerateError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Decode(_) => Self::InvalidResponse(failure.to_string()),
            _ => Self::Request(failure.to_string()),
        }
    }
}

/// POST `body` as JSON and decode the JSON response.
///
/// One attempt only: failures are returned to the caller as-is.
pub async fn post_json<B, R>(client: &Client, url: &str, body: &B) -> Result<R, HttpFailure>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    debug!("POST {}", url);
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| HttpFailure::Transport(format!("request to {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        return Err(HttpFailure::Status { status, body });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| HttpFailure::Transport(format!("reading response from {url} failed: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| HttpFailure::Decode(format!("unexpected response from {url}: {e}")))
}
