//! WebAuthn registration and authentication ceremonies.
//!
//! Each ceremony is the same shape: fetch a fresh challenge from the
//! admin-auth service, validate and decode it, hand the decoded options to
//! the platform authenticator, re-encode the resulting credential, and submit
//! it to the verify endpoint. Challenges are single-use; nothing is retried
//! automatically and no challenge state survives between attempts.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{AgentError, Result};
use crate::guard::CeremonyGuard;
use crate::session::Session;
use crate::transport::{Transport, WireResponse};
use crate::types::{
    AssertionCredential, AuthenticationOptions, ChallengeEnvelope, CredentialCreationOptions,
    CredentialRequestOptions, RegistrationCredential, RegistrationOptions, SessionGrant,
};

/// Platform credential API seam.
///
/// Implementations drive the actual hardware/platform authenticator. A call
/// may suspend indefinitely awaiting user interaction (hardware key tap,
/// biometric prompt). Rejections surface as
/// [`AgentError::CeremonyAborted`] for user cancellation, timeout, or an
/// already-registered credential.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Run the credential-creation ceremony.
    async fn create_credential(
        &self,
        options: CredentialCreationOptions,
    ) -> Result<RegistrationCredential>;

    /// Run the assertion ceremony against an existing credential.
    async fn get_assertion(&self, options: CredentialRequestOptions)
        -> Result<AssertionCredential>;
}

const REGISTER_CHALLENGE: &str = "auth/webauthn/register-challenge";
const REGISTER_VERIFY: &str = "auth/webauthn/register-verify";
const AUTHENTICATE_CHALLENGE: &str = "auth/webauthn/authenticate-challenge";
const AUTHENTICATE_VERIFY: &str = "auth/webauthn/authenticate-verify";

/// Executes WebAuthn ceremonies against the admin-auth service.
pub struct CeremonyClient {
    transport: Arc<dyn Transport>,
    authenticator: Arc<dyn Authenticator>,
    guard: CeremonyGuard,
}

impl CeremonyClient {
    pub fn new(transport: Arc<dyn Transport>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            transport,
            authenticator,
            guard: CeremonyGuard::new(),
        }
    }

    /// The guard serializing this client's ceremonies.
    pub fn guard(&self) -> &CeremonyGuard {
        &self.guard
    }

    /// Register a new hardware-backed credential for `email`.
    ///
    /// Returns `Ok(())` only after the verify endpoint has accepted the
    /// credential.
    pub async fn register_credential(&self, email: &str) -> Result<()> {
        // The flag must be held before any suspension point so overlapping
        // calls bail out without network activity.
        let _permit = self.guard.try_acquire()?;
        info!(email, "Starting credential registration ceremony");

        let options = self.fetch_challenge::<RegistrationOptions>(REGISTER_CHALLENGE, email).await?;
        let decoded = decode_registration_options(options)?;

        let credential = self.authenticator.create_credential(decoded).await?;
        debug!("Platform ceremony produced a credential, submitting for verification");

        let body = json!({
            "email": email,
            "credential": {
                "id": codec::encode(&credential.raw_id),
                "type": credential.ty,
                "response": {
                    "attestationObject": codec::encode(&credential.attestation_object),
                    "clientDataJSON": codec::encode(&credential.client_data_json),
                }
            }
        });

        let response = self.transport.post_json(REGISTER_VERIFY, body).await?;
        if !response.is_success() {
            return Err(AgentError::VerificationFailed(
                response
                    .error_message()
                    .unwrap_or("registration rejected by the admin-auth service")
                    .to_string(),
            ));
        }

        info!(email, "Credential registered");
        Ok(())
    }

    /// Authenticate `email` with an existing credential.
    ///
    /// On success the verify endpoint's session grant becomes the returned
    /// [`Session`].
    pub async fn authenticate(&self, email: &str) -> Result<Session> {
        let _permit = self.guard.try_acquire()?;
        info!(email, "Starting authentication ceremony");

        let options = self
            .fetch_challenge::<AuthenticationOptions>(AUTHENTICATE_CHALLENGE, email)
            .await?;
        let decoded = decode_authentication_options(options)?;

        let assertion = self.authenticator.get_assertion(decoded).await?;
        debug!("Platform ceremony produced an assertion, submitting for verification");

        let body = json!({
            "email": email,
            "credential": {
                "id": codec::encode(&assertion.raw_id),
                "type": assertion.ty,
                "response": {
                    "authenticatorData": codec::encode(&assertion.authenticator_data),
                    "clientDataJSON": codec::encode(&assertion.client_data_json),
                    "signature": codec::encode(&assertion.signature),
                    "userHandle": assertion.user_handle.as_deref().map(codec::encode),
                }
            }
        });

        let response = self.transport.post_json(AUTHENTICATE_VERIFY, body).await?;
        if !response.is_success() {
            return Err(AgentError::VerificationFailed(
                response
                    .error_message()
                    .unwrap_or("authentication rejected by the admin-auth service")
                    .to_string(),
            ));
        }

        let grant: SessionGrant = serde_json::from_value(response.body).map_err(|e| {
            AgentError::VerificationFailed(format!("unparseable session grant: {e}"))
        })?;

        info!(email, ttl = grant.ttl, "Authentication ceremony succeeded");
        Ok(Session::new(grant.session_token, grant.expires_at, grant.ttl))
    }

    /// POST `{email}` to a challenge endpoint and unwrap the options envelope.
    async fn fetch_challenge<T>(&self, path: &str, email: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .transport
            .post_json(path, json!({ "email": email }))
            .await?;

        if !response.is_success() {
            return Err(challenge_endpoint_error(&response));
        }

        let envelope: ChallengeEnvelope<T> = serde_json::from_value(response.body)
            .map_err(|e| AgentError::MalformedChallenge(format!("unparseable challenge response: {e}")))?;

        envelope
            .options
            .ok_or_else(|| missing_field("options"))
    }
}

/// Map a non-success challenge response to the right error kind.
///
/// HTTP 503 and explicit "Service unavailable" bodies get the remediation
/// message; everything else surfaces the server's own failure text.
fn challenge_endpoint_error(response: &WireResponse) -> AgentError {
    let unavailable = response.status == 503
        || response
            .error_message()
            .is_some_and(|m| m.eq_ignore_ascii_case("service unavailable"));

    if unavailable {
        return AgentError::ServiceUnavailable(
            "The admin-auth service is not running.\n\
             To start it:\n\
             1. Open a terminal\n\
             2. Navigate to the service: cd admin-auth\n\
             3. Run: LOCAL_DEV=true node index.js (listens on port 8443)\n\
             4. Keep that terminal open and retry"
                .to_string(),
        );
    }

    AgentError::NetworkError(format!(
        "challenge endpoint returned HTTP {}: {}",
        response.status,
        response.error_message().unwrap_or("no error detail")
    ))
}

fn missing_field(field: &str) -> AgentError {
    // A missing required field means the service speaks an older or newer
    // protocol revision; retrying the same request cannot help.
    AgentError::MalformedChallenge(format!(
        "missing {field} in challenge response; make sure the admin-auth service \
         is running the matching version"
    ))
}

/// Validate a registration challenge and decode its binary fields.
fn decode_registration_options(options: RegistrationOptions) -> Result<CredentialCreationOptions> {
    let challenge = options.challenge.ok_or_else(|| missing_field("challenge"))?;
    let rp = options.rp.unwrap_or_default();
    let rp_id = rp.id.ok_or_else(|| missing_field("rp.id"))?;
    let user = options.user.unwrap_or_default();
    let user_id = user.id.ok_or_else(|| missing_field("user.id"))?;
    if options.pub_key_cred_params.is_empty() {
        return Err(missing_field("pubKeyCredParams"));
    }

    let exclude_credentials = options
        .exclude_credentials
        .iter()
        .map(|c| codec::decode(&c.id))
        .collect::<Result<Vec<_>>>()?;

    Ok(CredentialCreationOptions {
        challenge: codec::decode(&challenge)?,
        rp_id,
        rp_name: rp.name,
        // The service sends a textual account identifier; the authenticator
        // wants its raw UTF-8 bytes, not a base64url decode.
        user_id: user_id.into_bytes(),
        user_name: user.name,
        user_display_name: user.display_name,
        pub_key_cred_params: options.pub_key_cred_params,
        exclude_credentials,
        timeout: options.timeout,
    })
}

/// Validate an authentication challenge and decode its binary fields.
///
/// Unlike registration, a missing relying party or allow list is only logged:
/// some deployments omit them without breaking the ceremony.
fn decode_authentication_options(
    options: AuthenticationOptions,
) -> Result<CredentialRequestOptions> {
    let challenge = options.challenge.ok_or_else(|| missing_field("challenge"))?;

    // The platform ceremony API expects the flat rpId; populate it from the
    // nested rp object when absent and drop the nested form.
    let rp_id = options
        .rp_id
        .or_else(|| options.rp.and_then(|rp| rp.id));
    if rp_id.is_none() {
        warn!("Authentication challenge omitted rpId; the ceremony may fail");
    }

    let allow_credentials = match options.allow_credentials {
        Some(list) => list
            .iter()
            .map(|c| codec::decode(&c.id))
            .collect::<Result<Vec<_>>>()?,
        None => {
            warn!("Authentication challenge omitted allowCredentials");
            Vec::new()
        }
    };

    Ok(CredentialRequestOptions {
        challenge: codec::decode(&challenge)?,
        rp_id,
        allow_credentials,
        timeout: options.timeout,
        user_verification: options.user_verification,
    })
}
