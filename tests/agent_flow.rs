//! End-to-end agent scenarios against the scripted transport and mock
//! authenticator: full ceremonies, overlap rejection, and session lifecycle.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use admin_auth_agent::{
    codec, AgentConfig, AgentError, AuthAgent, MemorySessionStore, MockAuthenticator,
    ScriptedTransport, SessionStore,
};

/// Route agent logs through the test harness when RUST_LOG is set.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn agent_with(
    transport: Arc<ScriptedTransport>,
    authenticator: Arc<MockAuthenticator>,
) -> (AuthAgent, Arc<MemorySessionStore>) {
    init_tracing();
    let store = Arc::new(MemorySessionStore::new());
    let agent = AuthAgent::with_parts(
        &AgentConfig::default(),
        transport,
        authenticator,
        Arc::clone(&store) as Arc<dyn SessionStore>,
    );
    (agent, store)
}

fn registration_challenge() -> serde_json::Value {
    json!({
        "options": {
            "challenge": codec::encode(&[0xDE, 0xAD, 0xBE, 0xEF]),
            "rp": {"id": "localhost", "name": "Admin Console"},
            "user": {"id": "550e8400-e29b-41d4-a716-446655440000", "name": "admin@example.com"},
            "pubKeyCredParams": [{"type": "public-key", "alg": -7}, {"type": "public-key", "alg": -257}],
            "excludeCredentials": [{"type": "public-key", "id": codec::encode(b"old-cred")}]
        }
    })
}

fn authentication_challenge() -> serde_json::Value {
    json!({
        "options": {
            "challenge": codec::encode(&[0x01, 0x02, 0x03]),
            "rpId": "localhost",
            "allowCredentials": [{"type": "public-key", "id": codec::encode(b"mock-credential-id")}]
        }
    })
}

fn session_grant() -> serde_json::Value {
    json!({
        "sessionToken": "session-token-1",
        "expiresAt": "2026-08-25T18:00:00Z",
        "ttl": 3600
    })
}

#[tokio::test]
async fn test_registration_round_trip() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, registration_challenge());
    transport.push_json(200, json!({}));
    let authenticator = MockAuthenticator::new();
    let (agent, _) = agent_with(Arc::clone(&transport), Arc::clone(&authenticator));

    agent.register_credential("admin@example.com").await.unwrap();

    // Challenge fields reached the authenticator decoded.
    let options = authenticator.creation_options();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].challenge, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(options[0].rp_id, "localhost");
    assert_eq!(options[0].user_id, b"550e8400-e29b-41d4-a716-446655440000");
    assert_eq!(options[0].exclude_credentials, vec![b"old-cred".to_vec()]);
    assert_eq!(options[0].pub_key_cred_params.len(), 2);

    // The credential went back out re-encoded as base64url text.
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "auth/webauthn/register-challenge");
    assert_eq!(requests[0].body.as_ref().unwrap()["email"], "admin@example.com");
    assert_eq!(requests[1].path, "auth/webauthn/register-verify");
    let credential = &requests[1].body.as_ref().unwrap()["credential"];
    assert_eq!(credential["id"], codec::encode(b"mock-credential-id"));
    assert_eq!(credential["type"], "public-key");
    assert_eq!(
        credential["response"]["attestationObject"],
        codec::encode(b"mock-attestation-object")
    );
    let client_data = credential["response"]["clientDataJSON"].as_str().unwrap();
    assert_eq!(codec::decode(client_data).unwrap(), br#"{"type":"webauthn.create"}"#);
}

#[tokio::test]
async fn test_registration_challenge_missing_rp_id() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        200,
        json!({
            "options": {
                "challenge": "AAEC",
                "user": {"id": "uuid-1"},
                "pubKeyCredParams": [{"type": "public-key", "alg": -7}]
            }
        }),
    );
    let authenticator = MockAuthenticator::new();
    let (agent, _) = agent_with(Arc::clone(&transport), Arc::clone(&authenticator));

    let err = agent.register_credential("admin@example.com").await.unwrap_err();
    assert!(matches!(err, AgentError::MalformedChallenge(msg) if msg.contains("rp.id")));
    assert!(authenticator.creation_options().is_empty(), "ceremony must not start");
    assert_eq!(transport.request_count(), 1, "no verify request after a malformed challenge");
}

#[tokio::test]
async fn test_authenticate_challenge_service_unavailable() {
    let transport = ScriptedTransport::new();
    transport.push_json(503, json!({"error": "Service unavailable"}));
    let (agent, _) = agent_with(Arc::clone(&transport), MockAuthenticator::new());

    let err = agent.authenticate("admin@example.com").await.unwrap_err();
    match err {
        AgentError::ServiceUnavailable(msg) => {
            assert!(msg.contains("8443"), "remediation must name the expected port");
            assert!(msg.contains("LOCAL_DEV"), "remediation must name the start command");
        }
        other => panic!("expected ServiceUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_authentication_round_trip_persists_session() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, authentication_challenge());
    transport.push_json(200, session_grant());
    let authenticator = MockAuthenticator::new();
    let (agent, store) = agent_with(Arc::clone(&transport), Arc::clone(&authenticator));

    let session = agent.authenticate("admin@example.com").await.unwrap();
    assert_eq!(session.token(), "session-token-1");
    assert_eq!(session.ttl_secs(), 3600);

    let persisted = store.load().expect("session must be persisted");
    assert_eq!(persisted.token(), "session-token-1");

    // Decoded allow list and flat rpId reached the authenticator.
    let options = authenticator.assertion_options();
    assert_eq!(options[0].rp_id.as_deref(), Some("localhost"));
    assert_eq!(options[0].allow_credentials, vec![b"mock-credential-id".to_vec()]);

    // Assertion subfields were re-encoded for the wire, userHandle included.
    let requests = transport.requests();
    let response = &requests[1].body.as_ref().unwrap()["credential"]["response"];
    assert_eq!(response["signature"], codec::encode(b"mock-signature"));
    assert_eq!(response["userHandle"], codec::encode(b"mock-user-handle"));
}

#[tokio::test]
async fn test_authentication_flattens_nested_rp_object() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        200,
        json!({
            "options": {
                "challenge": codec::encode(&[9, 9, 9]),
                "rp": {"id": "nested.example"}
            }
        }),
    );
    transport.push_json(200, session_grant());
    let authenticator = MockAuthenticator::new();
    let (agent, _) = agent_with(Arc::clone(&transport), Arc::clone(&authenticator));

    agent.authenticate("admin@example.com").await.unwrap();

    // Missing allowCredentials is tolerated; the nested rp id is promoted.
    let options = authenticator.assertion_options();
    assert_eq!(options[0].rp_id.as_deref(), Some("nested.example"));
    assert!(options[0].allow_credentials.is_empty());
}

#[tokio::test]
async fn test_back_to_back_ceremonies_second_is_rejected() {
    let transport = ScriptedTransport::new();
    // Delay the challenge so the first ceremony is still in flight when the
    // second call is polled.
    transport.push_delayed_json(200, authentication_challenge(), Duration::from_millis(50));
    transport.push_json(200, session_grant());
    let (agent, _) = agent_with(
        Arc::clone(&transport),
        MockAuthenticator::new(),
    );

    let (first, second) = tokio::join!(
        agent.authenticate("a@example.com"),
        agent.authenticate("a@example.com")
    );

    assert!(first.is_ok(), "the original call's outcome is unaffected");
    assert!(matches!(second, Err(AgentError::OperationInProgress)));
    assert_eq!(
        transport.request_count(),
        2,
        "only one challenge/verify sequence on the wire"
    );
}

#[tokio::test]
async fn test_register_blocks_concurrent_authenticate() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, registration_challenge());
    transport.push_json(200, json!({}));
    // Hold the ceremony open at the authenticator, past the challenge fetch.
    let authenticator = MockAuthenticator::with_delay(Duration::from_millis(50));
    let (agent, _) = agent_with(Arc::clone(&transport), authenticator);

    let (register, authenticate) = tokio::join!(
        agent.register_credential("admin@example.com"),
        agent.authenticate("admin@example.com")
    );

    assert!(register.is_ok());
    assert!(matches!(authenticate, Err(AgentError::OperationInProgress)));
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_aborted_ceremony_releases_the_guard() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, authentication_challenge());
    transport.push_json(200, authentication_challenge());
    let rejecting = MockAuthenticator::rejecting("user cancelled the request");
    let (agent, _) = agent_with(Arc::clone(&transport), rejecting);

    let err = agent.authenticate("admin@example.com").await.unwrap_err();
    assert!(matches!(err, AgentError::CeremonyAborted(_)));

    // The next attempt reaches the authenticator again instead of tripping
    // the guard.
    let err = agent.authenticate("admin@example.com").await.unwrap_err();
    assert!(matches!(err, AgentError::CeremonyAborted(_)));
}

#[tokio::test]
async fn test_verify_endpoint_rejection_is_verification_failed() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, registration_challenge());
    transport.push_json(400, json!({"error": "credential already registered"}));
    let (agent, _) = agent_with(Arc::clone(&transport), MockAuthenticator::new());

    let err = agent.register_credential("admin@example.com").await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::VerificationFailed(msg) if msg.contains("already registered")
    ));
}

#[tokio::test]
async fn test_session_lifecycle_after_authentication() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, authentication_challenge());
    transport.push_json(200, session_grant());
    transport.push_json(200, json!({"email": "admin@example.com"}));
    transport.push_json(401, json!({"error": "expired"}));
    let (agent, store) = agent_with(Arc::clone(&transport), MockAuthenticator::new());

    agent.authenticate("admin@example.com").await.unwrap();

    let identity = agent.verify_session().await.unwrap();
    assert_eq!(identity.email, "admin@example.com");

    // A later rejection clears the persisted session (fail closed).
    let err = agent.verify_session().await.unwrap_err();
    assert!(matches!(err, AgentError::Auth(_)));
    assert!(store.load().is_none());
    assert!(agent.current_session().is_none());
}

#[tokio::test]
async fn test_logout_clears_session_despite_network_failure() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, authentication_challenge());
    transport.push_json(200, session_grant());
    transport.push_failure("connection refused");
    let (agent, store) = agent_with(Arc::clone(&transport), MockAuthenticator::new());

    agent.authenticate("admin@example.com").await.unwrap();
    assert!(store.load().is_some());

    agent.logout().await;
    assert!(store.load().is_none());
}
