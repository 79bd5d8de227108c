//! Session persistence, verification, and revocation.
//!
//! A successful authentication ceremony yields a bearer session. The manager
//! persists it through a [`SessionStore`], verifies it against the service
//! (failing closed: any rejection clears the local copy), and revokes it on
//! logout. Local state never retains a token the caller believes is revoked,
//! even when the revocation request itself fails.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AgentError, Result};
use crate::transport::Transport;
use crate::types::Identity;

const VERIFY: &str = "auth/verify";
const LOGOUT: &str = "auth/logout";

/// Bearer session issued by a successful authentication ceremony.
///
/// The token is zeroized on drop and redacted from `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Session {
    token: String,
    #[zeroize(skip)]
    expires_at: DateTime<Utc>,
    #[zeroize(skip)]
    ttl_secs: u64,
}

impl Session {
    pub fn new(token: String, expires_at: DateTime<Utc>, ttl_secs: u64) -> Self {
        Self {
            token,
            expires_at,
            ttl_secs,
        }
    }

    /// The bearer token for outbound requests.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Whether the session has expired as of `now`.
    ///
    /// A pre-check convenience only; the service remains the authority via
    /// [`SessionManager::verify`].
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// Durable storage for the current session.
pub trait SessionStore: Send + Sync {
    fn store(&self, session: Session);
    fn load(&self) -> Option<Session>;
    fn clear(&self);
}

/// In-memory session storage (default).
///
/// Holds at most one session, like the browser-local storage slot it
/// replaces.
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn store(&self, session: Session) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    fn load(&self) -> Option<Session> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Persists, verifies, and revokes the session issued by authentication.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn SessionStore>) -> Self {
        Self { transport, store }
    }

    /// Durably store a session for later use by outbound requests.
    pub fn persist(&self, session: Session) {
        info!(expires_at = %session.expires_at(), "Persisting session");
        self.store.store(session);
    }

    /// The currently persisted session, if any.
    pub fn current(&self) -> Option<Session> {
        self.store.load()
    }

    /// Verify the stored session against the service.
    ///
    /// Fails closed: any rejection, transport failure, or unparseable
    /// response clears the local session before the error is returned. On
    /// success, returns the identity the server attributes to the token.
    pub async fn verify(&self) -> Result<Identity> {
        let session = self
            .store
            .load()
            .ok_or_else(|| AgentError::Auth("no session token found; sign in first".to_string()))?;

        let response = match self.transport.get(VERIFY, Some(session.token())).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Session verification request failed, clearing local session");
                self.store.clear();
                return Err(AgentError::Auth(format!("session verification failed: {e}")));
            }
        };

        if !response.is_success() {
            debug!(status = response.status, "Session rejected, clearing local session");
            self.store.clear();
            return Err(AgentError::Auth(
                response
                    .error_message()
                    .unwrap_or("session rejected by the admin-auth service")
                    .to_string(),
            ));
        }

        let identity: Identity = serde_json::from_value(response.body).map_err(|e| {
            self.store.clear();
            AgentError::Auth(format!("unparseable identity response: {e}"))
        })?;

        debug!(email = %identity.email, "Session verified");
        Ok(identity)
    }

    /// Revoke the session: best-effort POST to the logout endpoint, then
    /// unconditionally clear the local session.
    pub async fn logout(&self) {
        if let Some(session) = self.store.load() {
            match self.transport.post(LOGOUT, Some(session.token())).await {
                Ok(response) if !response.is_success() => {
                    warn!(
                        status = response.status,
                        "Logout rejected by the service; clearing local session anyway"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Logout request failed; clearing local session anyway");
                }
                Ok(_) => info!("Logged out"),
            }
        }
        self.store.clear();
    }
}
