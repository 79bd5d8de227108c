//! Deterministic mock implementations of the external seams.
//!
//! Testing only: the scripted transport replays queued replies instead of
//! touching the network, and the mock authenticator fabricates credentials
//! instead of driving platform hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::ceremony::Authenticator;
use crate::error::{AgentError, Result};
use crate::transport::{Transport, WireResponse};
use crate::types::{
    AssertionCredential, CredentialCreationOptions, CredentialRequestOptions,
    RegistrationCredential,
};

/// One scripted reply for the next request, in FIFO order.
pub enum ScriptedReply {
    /// Respond with this status and body.
    Respond(WireResponse),
    /// Respond after a delay (lets tests overlap in-flight requests).
    RespondAfter(Duration, WireResponse),
    /// Fail at the transport level with this message.
    Fail(String),
    /// Never resolve.
    Hang,
}

/// A request the scripted transport observed.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub bearer: Option<String>,
}

/// Transport that replays a script of replies and records every request.
/// WARNING: testing only.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Queue a JSON reply.
    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push(ScriptedReply::Respond(WireResponse { status, body }));
    }

    /// Queue a JSON reply delivered after `delay`.
    pub fn push_delayed_json(&self, status: u16, body: serde_json::Value, delay: Duration) {
        self.push(ScriptedReply::RespondAfter(
            delay,
            WireResponse { status, body },
        ));
    }

    /// Queue a transport-level failure.
    pub fn push_failure(&self, message: &str) {
        self.push(ScriptedReply::Fail(message.to_string()));
    }

    /// Queue a reply that never resolves.
    pub fn push_hang(&self) {
        self.push(ScriptedReply::Hang);
    }

    /// Number of requests issued so far.
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every request observed so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn dispatch(
        &self,
        method: &'static str,
        path: &str,
        body: Option<serde_json::Value>,
        bearer: Option<&str>,
    ) -> Result<WireResponse> {
        let reply = {
            let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
            requests.push(RecordedRequest {
                method,
                path: path.to_string(),
                body,
                bearer: bearer.map(str::to_string),
            });
            self.replies
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
        };

        match reply {
            Some(ScriptedReply::Respond(response)) => Ok(response),
            Some(ScriptedReply::RespondAfter(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(ScriptedReply::Fail(message)) => Err(AgentError::NetworkError(message)),
            Some(ScriptedReply::Hang) => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
            None => Err(AgentError::NetworkError(format!(
                "no scripted reply for {method} {path}"
            ))),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<WireResponse> {
        self.dispatch("POST", path, Some(body), None).await
    }

    async fn get(&self, path: &str, bearer: Option<&str>) -> Result<WireResponse> {
        self.dispatch("GET", path, None, bearer).await
    }

    async fn post(&self, path: &str, bearer: Option<&str>) -> Result<WireResponse> {
        self.dispatch("POST", path, None, bearer).await
    }
}

/// Authenticator that fabricates deterministic credentials.
/// WARNING: testing only - produces no real cryptographic material.
#[derive(Default)]
pub struct MockAuthenticator {
    reject_with: Option<String>,
    /// Simulated user-interaction latency before the ceremony resolves
    delay: Option<Duration>,
    creations: Mutex<Vec<CredentialCreationOptions>>,
    assertions: Mutex<Vec<CredentialRequestOptions>>,
}

impl MockAuthenticator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// An authenticator that rejects every ceremony with `reason`.
    pub fn rejecting(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            reject_with: Some(reason.to_string()),
            ..Self::default()
        })
    }

    /// An authenticator that resolves after `delay`, as if awaiting a key tap.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Creation options received so far.
    pub fn creation_options(&self) -> Vec<CredentialCreationOptions> {
        self.creations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Assertion options received so far.
    pub fn assertion_options(&self) -> Vec<CredentialRequestOptions> {
        self.assertions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn gate(&self) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.reject_with {
            return Err(AgentError::CeremonyAborted(reason.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    async fn create_credential(
        &self,
        options: CredentialCreationOptions,
    ) -> Result<RegistrationCredential> {
        self.gate().await?;
        self.creations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(options);

        Ok(RegistrationCredential {
            raw_id: b"mock-credential-id".to_vec(),
            ty: "public-key".to_string(),
            attestation_object: b"mock-attestation-object".to_vec(),
            client_data_json: br#"{"type":"webauthn.create"}"#.to_vec(),
        })
    }

    async fn get_assertion(
        &self,
        options: CredentialRequestOptions,
    ) -> Result<AssertionCredential> {
        self.gate().await?;
        self.assertions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(options);

        Ok(AssertionCredential {
            raw_id: b"mock-credential-id".to_vec(),
            ty: "public-key".to_string(),
            authenticator_data: b"mock-authenticator-data".to_vec(),
            client_data_json: br#"{"type":"webauthn.get"}"#.to_vec(),
            signature: b"mock-signature".to_vec(),
            user_handle: Some(b"mock-user-handle".to_vec()),
        })
    }
}
