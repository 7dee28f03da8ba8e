//! Coordinates service error types.

use broker_rpc::HandlerError;
use thiserror::Error;

/// Coordinates service error type.
#[derive(Debug, Error)]
pub enum CoordsError {
    /// Latitude or longitude outside its valid range.
    #[error("Invalid coordinate: {0}")]
    OutOfRange(String),

    /// Request payload did not match the expected shape.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<CoordsError> for HandlerError {
    fn from(err: CoordsError) -> Self {
        match &err {
            CoordsError::OutOfRange(_) | CoordsError::InvalidPayload(_) => {
                HandlerError::invalid_payload(err.to_string())
            }
        }
    }
}
