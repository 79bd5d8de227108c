//! Challenge, credential, and session types.
//!
//! Wire types mirror the admin-auth service's JSON bodies. Every field the
//! protocol requires is still modeled as `Option` (or an empty default) so
//! that validation, not serde, decides what is missing and can name the
//! offending field in a [`crate::error::AgentError::MalformedChallenge`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Wire types (as received from the service, binary fields base64url text)
// ---------------------------------------------------------------------------

/// Envelope around either challenge response: `{"options": {...}}`.
#[derive(Debug, Deserialize)]
pub struct ChallengeEnvelope<T> {
    pub options: Option<T>,
}

/// Relying-party identity as sent by the service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelyingParty {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// User identity as sent by the service. The id is a textual account
/// identifier (UUID), not base64url.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserEntity {
    pub id: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
}

/// One accepted public-key algorithm.
#[derive(Debug, Clone, Deserialize)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub ty: String,
    pub alg: i64,
}

/// Reference to an existing credential in an exclusion or allow list.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialDescriptor {
    #[serde(rename = "type", default)]
    pub ty: String,
    /// Credential identifier, base64url on the wire
    pub id: String,
}

/// Registration challenge options (`register-challenge` response).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationOptions {
    pub challenge: Option<String>,
    pub rp: Option<RelyingParty>,
    pub user: Option<UserEntity>,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    pub exclude_credentials: Vec<CredentialDescriptor>,
    pub timeout: Option<u64>,
    pub attestation: Option<String>,
}

/// Authentication challenge options (`authenticate-challenge` response).
///
/// The relying-party identifier may arrive flat (`rpId`) or nested under an
/// `rp` object depending on the service version; decoding flattens it because
/// the platform ceremony API rejects the nested form.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthenticationOptions {
    pub challenge: Option<String>,
    pub rp_id: Option<String>,
    pub rp: Option<RelyingParty>,
    pub allow_credentials: Option<Vec<CredentialDescriptor>>,
    pub timeout: Option<u64>,
    pub user_verification: Option<String>,
}

/// Session grant returned by `authenticate-verify`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub ttl: u64,
}

/// Identity the service attributes to a verified session token.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub email: String,
}

// ---------------------------------------------------------------------------
// Decoded types (as handed to the platform authenticator, raw bytes)
// ---------------------------------------------------------------------------

/// Validated and decoded options for a credential-creation ceremony.
#[derive(Debug, Clone)]
pub struct CredentialCreationOptions {
    pub challenge: Vec<u8>,
    pub rp_id: String,
    pub rp_name: Option<String>,
    /// UTF-8 bytes of the textual account identifier
    pub user_id: Vec<u8>,
    pub user_name: Option<String>,
    pub user_display_name: Option<String>,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    /// Decoded identifiers of credentials the authenticator must not re-register
    pub exclude_credentials: Vec<Vec<u8>>,
    pub timeout: Option<u64>,
}

/// Validated and decoded options for an assertion ceremony.
#[derive(Debug, Clone)]
pub struct CredentialRequestOptions {
    pub challenge: Vec<u8>,
    /// Effective relying-party id; `None` is tolerated (some deployments omit
    /// it without breaking the ceremony)
    pub rp_id: Option<String>,
    /// Decoded identifiers of credentials accepted for this challenge
    pub allow_credentials: Vec<Vec<u8>>,
    pub timeout: Option<u64>,
    pub user_verification: Option<String>,
}

/// Result of a credential-creation ceremony.
#[derive(Debug, Clone)]
pub struct RegistrationCredential {
    pub raw_id: Vec<u8>,
    /// Credential type tag, normally `public-key`
    pub ty: String,
    pub attestation_object: Vec<u8>,
    pub client_data_json: Vec<u8>,
}

/// Result of an assertion ceremony.
#[derive(Debug, Clone)]
pub struct AssertionCredential {
    pub raw_id: Vec<u8>,
    pub ty: String,
    pub authenticator_data: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub signature: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
}
