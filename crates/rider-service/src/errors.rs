//! Rider service error types.

use broker_rpc::HandlerError;
use thiserror::Error;

/// Rider service error type.
#[derive(Debug, Error)]
pub enum RiderError {
    /// No rider with the requested id.
    #[error("Rider {0} not found")]
    NotFound(i64),

    /// Request payload did not match the expected shape.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<RiderError> for HandlerError {
    fn from(err: RiderError) -> Self {
        match &err {
            RiderError::NotFound(_) => HandlerError::not_found(err.to_string()),
            RiderError::InvalidPayload(_) => HandlerError::invalid_payload(err.to_string()),
        }
    }
}
