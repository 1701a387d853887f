use thiserror::Error;

/// Failure taxonomy for a voice call session.
///
/// The session surfaces a single message string to the UI, so every variant
/// carries its user-facing text directly.
#[derive(Debug, Error)]
pub enum CallError {
    /// Capture device access denied or unavailable.
    #[error("{0}")]
    Permission(String),

    /// Session negotiation failed (non-success response or missing wsUrl).
    #[error("{0}")]
    Signaling(String),

    /// Channel-level open or communication failure.
    #[error("{0}")]
    Transport(String),

    /// Malformed or unparseable inbound message. Swallowed per-message
    /// during dispatch; never fatal to the session.
    #[error("malformed inbound message: {0}")]
    Protocol(String),

    /// Explicit end/close by the user.
    #[error("call ended by user")]
    UserAbort,
}

pub type CallResult<T> = Result<T, CallError>;
