use thiserror::Error;

/// Errors surfaced by the authentication agent.
///
/// Every variant carries a human-readable message suitable for direct display.
/// All ceremony errors are terminal for the current attempt; nothing in this
/// crate retries automatically.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The admin-auth service answered with a not-ready/unavailable signal.
    /// The message includes operator remediation steps.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// A required field was missing from a challenge response. This signals a
    /// backend/client version mismatch, not a transient fault.
    #[error("Malformed challenge: {0}")]
    MalformedChallenge(String),

    /// The platform credential ceremony was rejected (user cancellation,
    /// timeout, or an already-registered credential).
    #[error("Ceremony aborted: {0}")]
    CeremonyAborted(String),

    /// The verify endpoint rejected the credential.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Transport-level failure at any step.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A register or authenticate ceremony is already running. The platform
    /// credential API cannot service two concurrent ceremonies.
    #[error("Another credential ceremony is already in progress")]
    OperationInProgress,

    /// Input to the binary codec was not valid unpadded base64url.
    #[error("Malformed base64url encoding: {0}")]
    MalformedEncoding(String),

    /// Session verification or lookup failed. The local session is cleared
    /// whenever this is returned from a verify attempt.
    #[error("Session error: {0}")]
    Auth(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
