//! The authentication agent facade.
//!
//! One `AuthAgent` instance owns the process-wide mutable state the protocol
//! needs (ceremony flag, health probe cache and in-flight slot, persisted
//! session) and is shared by reference. Construct it once per process.

use std::sync::Arc;

use crate::ceremony::{Authenticator, CeremonyClient};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::health::{HealthProbe, HealthStatus};
use crate::session::{MemorySessionStore, Session, SessionManager, SessionStore};
use crate::transport::{HttpTransport, Transport};
use crate::types::Identity;

/// Client-side WebAuthn authentication agent for the admin console.
pub struct AuthAgent {
    ceremony: CeremonyClient,
    session: SessionManager,
    health: HealthProbe,
}

impl AuthAgent {
    /// Create an agent talking HTTP to the configured admin-auth service,
    /// with in-memory session storage.
    pub fn new(config: &AgentConfig, authenticator: Arc<dyn Authenticator>) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config)?);
        Ok(Self::with_parts(
            config,
            transport,
            authenticator,
            Arc::new(MemorySessionStore::new()),
        ))
    }

    /// Create an agent from explicit seams (custom transport or store).
    pub fn with_parts(
        config: &AgentConfig,
        transport: Arc<dyn Transport>,
        authenticator: Arc<dyn Authenticator>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            ceremony: CeremonyClient::new(Arc::clone(&transport), authenticator),
            session: SessionManager::new(Arc::clone(&transport), store),
            health: HealthProbe::new(
                transport,
                config.probe_request_timeout,
                config.probe_lock_timeout,
            ),
        }
    }

    /// Register a new hardware-backed credential for `email`.
    pub async fn register_credential(&self, email: &str) -> Result<()> {
        self.ceremony.register_credential(email).await
    }

    /// Authenticate `email` and persist the resulting session.
    pub async fn authenticate(&self, email: &str) -> Result<Session> {
        let session = self.ceremony.authenticate(email).await?;
        self.session.persist(session.clone());
        Ok(session)
    }

    /// Verify the persisted session, returning the attributed identity.
    pub async fn verify_session(&self) -> Result<Identity> {
        self.session.verify().await
    }

    /// Revoke the persisted session (best-effort remotely, unconditionally
    /// locally).
    pub async fn logout(&self) {
        self.session.logout().await
    }

    /// The persisted session, if any.
    pub fn current_session(&self) -> Option<Session> {
        self.session.current()
    }

    /// Probe the service's health, or return the cached/pending result.
    /// Health never gates a ceremony attempt; it only informs UI decisions.
    pub async fn probe_health(&self, force_refresh: bool) -> HealthStatus {
        self.health.probe(force_refresh).await
    }

    /// Last cached health status without network access.
    pub fn cached_health(&self) -> Option<HealthStatus> {
        self.health.cached()
    }
}
