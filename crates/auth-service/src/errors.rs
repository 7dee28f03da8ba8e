//! Authentication service error types.
//!
//! Every variant maps to a stable `HandlerError` kind that travels back to
//! the caller in the error reply. Credential details never leak into
//! messages.

use broker_rpc::HandlerError;
use thiserror::Error;

/// Authentication service error type.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Email already registered.
    #[error("Email already registered")]
    EmailTaken,

    /// Email/password pair did not match.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token failed verification or expired.
    #[error("Invalid token")]
    InvalidToken,

    /// Request payload did not match the expected shape.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Password hashing failed.
    #[error("Hashing error: {0}")]
    Hashing(String),

    /// Downstream RPC call failed (e.g. rider provisioning).
    #[error("RPC error: {0}")]
    Rpc(String),
}

impl From<AuthError> for HandlerError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::EmailTaken => HandlerError::conflict(err.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidToken => {
                HandlerError::unauthorized(err.to_string())
            }
            AuthError::InvalidPayload(_) => HandlerError::invalid_payload(err.to_string()),
            // Internal detail stays server-side; callers get a generic kind.
            AuthError::Hashing(_) | AuthError::Rpc(_) => {
                HandlerError::internal("authentication service failure")
            }
        }
    }
}
