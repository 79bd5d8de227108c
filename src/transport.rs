//! HTTP transport to the admin-auth ceremony service.
//!
//! The agent talks to the backend exclusively through the [`Transport`] trait
//! so ceremonies, health probes, and session calls can be exercised against a
//! scripted implementation in tests (see [`crate::mock::ScriptedTransport`]).

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};

/// A normalized response from the admin-auth service.
///
/// Bodies are decoded as JSON; empty or unparseable bodies are normalized to
/// an empty object so callers can probe fields without special-casing.
#[derive(Debug, Clone)]
pub struct WireResponse {
    /// HTTP status code
    pub status: u16,
    /// Decoded JSON body (empty object when the body was empty or invalid)
    pub body: serde_json::Value,
}

impl WireResponse {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Server-provided failure text, from either the `error` or `message`
    /// field of the body.
    pub fn error_message(&self) -> Option<&str> {
        self.body
            .get("error")
            .and_then(|v| v.as_str())
            .or_else(|| self.body.get("message").and_then(|v| v.as_str()))
    }
}

/// Wire access to the admin-auth service.
///
/// Implementations must be thread-safe (`Send + Sync`). Paths are relative to
/// the service base URL. A returned `Err` always means a transport-level
/// failure; HTTP error statuses are returned as successful [`WireResponse`]s
/// for the caller to interpret.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON body to `path`.
    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<WireResponse>;

    /// GET `path`, optionally with a bearer token.
    async fn get(&self, path: &str, bearer: Option<&str>) -> Result<WireResponse>;

    /// POST to `path` with no body, optionally with a bearer token.
    async fn post(&self, path: &str, bearer: Option<&str>) -> Result<WireResponse>;
}

/// Production transport over reqwest.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport from the agent configuration.
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AgentError::NetworkError(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AgentError::NetworkError(format!("invalid endpoint path {path:?}: {e}")))
    }

    async fn dispatch(&self, request: reqwest::RequestBuilder, path: &str) -> Result<WireResponse> {
        let start = Instant::now();

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, path, latency_ms = start.elapsed().as_millis() as u64, "Request failed");
            AgentError::NetworkError(format!("request to {path} failed: {e}"))
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            AgentError::NetworkError(format!("failed to read response from {path}: {e}"))
        })?;

        // Empty and non-JSON bodies are valid for some endpoints (logout,
        // register-verify); normalize them instead of failing.
        let body = if text.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_str(&text)
                .unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
        };

        debug!(
            status,
            path,
            latency_ms = start.elapsed().as_millis() as u64,
            "Received HTTP response"
        );

        Ok(WireResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<WireResponse> {
        let url = self.endpoint(path)?;
        self.dispatch(self.client.post(url).json(&body), path).await
    }

    async fn get(&self, path: &str, bearer: Option<&str>) -> Result<WireResponse> {
        let url = self.endpoint(path)?;
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.dispatch(request, path).await
    }

    async fn post(&self, path: &str, bearer: Option<&str>) -> Result<WireResponse> {
        let url = self.endpoint(path)?;
        let mut request = self.client.post(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.dispatch(request, path).await
    }
}
