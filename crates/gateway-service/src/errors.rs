//! Gateway error type and its HTTP mapping.
//!
//! Remote handler errors carry a stable `kind`; the gateway translates that
//! kind into a status code. Broker-level failures map onto the gateway
//! status family (502/504) without leaking transport detail to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use broker_rpc::RpcError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Gateway error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or malformed Authorization header.
    #[error("Missing or malformed bearer token")]
    MissingToken,

    /// A broker call failed or the remote handler reported an error.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GatewayError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".to_string(),
                "Missing or malformed bearer token".to_string(),
            ),
            GatewayError::Rpc(RpcError::Remote(err)) => {
                let status = match err.kind.as_str() {
                    "not-found" => StatusCode::NOT_FOUND,
                    "unauthorized" => StatusCode::UNAUTHORIZED,
                    "conflict" => StatusCode::CONFLICT,
                    "invalid-payload" => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.kind.clone(), err.message.clone())
            }
            GatewayError::Rpc(RpcError::Timeout { command, .. }) => {
                warn!(command = %command, "Upstream call timed out");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "upstream-timeout".to_string(),
                    "The upstream service did not respond in time".to_string(),
                )
            }
            GatewayError::Rpc(
                RpcError::Transport(_) | RpcError::UnknownCommand(_) | RpcError::ChannelClosed,
            ) => {
                error!(error = %self, "Upstream call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "bad-gateway".to_string(),
                    "The upstream service is unavailable".to_string(),
                )
            }
            GatewayError::Rpc(_) => {
                error!(error = %self, "Unexpected gateway error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal".to_string(),
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorDetail { code, message },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use broker_rpc::HandlerError;

    fn status_of(err: GatewayError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_remote_kinds_map_to_statuses() {
        let cases = [
            (HandlerError::not_found("gone"), StatusCode::NOT_FOUND),
            (HandlerError::unauthorized("no"), StatusCode::UNAUTHORIZED),
            (HandlerError::conflict("dup"), StatusCode::CONFLICT),
            (
                HandlerError::invalid_payload("bad"),
                StatusCode::BAD_REQUEST,
            ),
            (
                HandlerError::internal("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (remote, expected) in cases {
            assert_eq!(status_of(GatewayError::Rpc(RpcError::Remote(remote))), expected);
        }
    }

    #[test]
    fn test_broker_failures_map_to_gateway_statuses() {
        let timeout = RpcError::Timeout {
            command: "get-rider".to_string(),
            elapsed_ms: 5_000,
        };
        assert_eq!(
            status_of(GatewayError::Rpc(timeout)),
            StatusCode::GATEWAY_TIMEOUT
        );

        assert_eq!(
            status_of(GatewayError::Rpc(RpcError::Transport("down".to_string()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(GatewayError::Rpc(RpcError::UnknownCommand(
                "get-rider".to_string()
            ))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        assert_eq!(status_of(GatewayError::MissingToken), StatusCode::UNAUTHORIZED);
    }
}
