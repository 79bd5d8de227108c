//! Admin Auth Agent - client-side WebAuthn authentication for the admin console
//!
//! This crate signs a privileged administrative console into the backend
//! admin-auth ceremony service using hardware-backed WebAuthn (FIDO2)
//! credentials instead of passwords. It implements the client half of the
//! protocol only; the ceremony server is reached through its HTTP wire
//! contract and the platform authenticator through the [`Authenticator`]
//! seam.
//!
//! # Components
//!
//! - [`codec`] - base64url (URL-safe, unpadded) conversion for binary
//!   protocol fields crossing the JSON boundary
//! - [`HealthProbe`] - single-flight liveness probing with caching and
//!   forced refresh
//! - [`CeremonyClient`] - the registration and authentication ceremonies
//! - [`CeremonyGuard`] - serializes ceremony invocations process-wide
//! - [`SessionManager`] - persists, verifies, and revokes the bearer session
//! - [`AuthAgent`] - facade owning all of the above for one process
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use admin_auth_agent::{AgentConfig, AuthAgent, MockAuthenticator};
//!
//! # async fn example() -> admin_auth_agent::Result<()> {
//! // In production, pass a platform-backed Authenticator implementation.
//! let agent = AuthAgent::new(&AgentConfig::from_env(), MockAuthenticator::new())?;
//!
//! let health = agent.probe_health(false).await;
//! println!("admin-auth service: {:?}", health.health);
//!
//! let session = agent.authenticate("admin@example.com").await?;
//! println!("signed in until {}", session.expires_at());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod ceremony;
pub mod codec;
pub mod config;
pub mod error;
pub mod guard;
pub mod health;
pub mod mock;
pub mod session;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use agent::AuthAgent;
pub use ceremony::{Authenticator, CeremonyClient};
pub use config::{AgentConfig, DEFAULT_BASE_URL};
pub use error::{AgentError, Result};
pub use guard::{CeremonyGuard, CeremonyPermit};
pub use health::{Health, HealthProbe, HealthStatus};
pub use mock::{MockAuthenticator, ScriptedTransport};
pub use session::{MemorySessionStore, Session, SessionManager, SessionStore};
pub use transport::{HttpTransport, Transport, WireResponse};
pub use types::{
    AssertionCredential, CredentialCreationOptions, CredentialRequestOptions, Identity,
    PubKeyCredParam, RegistrationCredential,
};
