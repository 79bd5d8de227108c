//! Agent configuration.
//!
//! Handles loading configuration from environment variables with sensible
//! defaults. The defaults target the local-development deployment: the
//! admin-auth service listening on `http://localhost:8443`.

use std::time::Duration;

use url::Url;

/// Default base URL of the admin-auth ceremony service.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8443";

/// Configuration for the authentication agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the admin-auth service (default: `http://localhost:8443`)
    pub base_url: Url,
    /// Timeout for ceremony and session HTTP requests (default: 30s)
    pub request_timeout: Duration,
    /// Timeout for a single health probe request (default: 5s)
    pub probe_request_timeout: Duration,
    /// Safety-net timeout after which an in-flight health probe slot is
    /// released even if the underlying request never resolved (default: 10s)
    pub probe_lock_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            // DEFAULT_BASE_URL is a valid URL, parse cannot fail
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            request_timeout: Duration::from_secs(30),
            probe_request_timeout: Duration::from_secs(5),
            probe_lock_timeout: Duration::from_secs(10),
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables.
    ///
    /// Recognized variables: `ADMIN_AUTH_URL`, `ADMIN_AUTH_TIMEOUT_SECS`,
    /// `ADMIN_AUTH_PROBE_TIMEOUT_SECS`, `ADMIN_AUTH_PROBE_LOCK_SECS`.
    /// Unset or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("ADMIN_AUTH_URL")
            .ok()
            .and_then(|v| Url::parse(&v).ok())
            .unwrap_or(defaults.base_url);

        let request_timeout = std::env::var("ADMIN_AUTH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let probe_request_timeout = std::env::var("ADMIN_AUTH_PROBE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.probe_request_timeout);

        let probe_lock_timeout = std::env::var("ADMIN_AUTH_PROBE_LOCK_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.probe_lock_timeout);

        Self {
            base_url,
            request_timeout,
            probe_request_timeout,
            probe_lock_timeout,
        }
    }
}
