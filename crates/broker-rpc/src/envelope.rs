//! Wire envelope for command requests and replies.
//!
//! Every message exchanged over the broker is one JSON-encoded [`Envelope`].
//! Requests carry `reply_to`; replies omit it and instead carry `status`
//! (and `error` when `status` is `error`), echoing the request's
//! `correlation_id`. All services must use this encoding — a service
//! deviating breaks interoperability.

use crate::errors::{HandlerError, RpcError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply outcome marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    /// Handler completed and `payload` holds its result.
    Ok,
    /// Handler (or dispatch) failed and `error` holds the failure.
    Error,
}

/// The unit exchanged over the broker.
///
/// The payload is opaque to the transport layer; the core never inspects it
/// beyond routing by `command`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Opaque token linking a reply to its originating request. Generated
    /// by the client proxy, unique for the proxy's lifetime.
    pub correlation_id: String,

    /// Named remote operation identifier (e.g. `create-rider`).
    pub command: String,

    /// Command arguments (request) or handler result (ok reply).
    #[serde(default)]
    pub payload: Value,

    /// Destination the listener must publish its reply to.
    /// Present on requests only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,

    /// Reply outcome. Present on replies only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReplyStatus>,

    /// Failure detail. Present on error replies only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<HandlerError>,
}

impl Envelope {
    /// Build a request envelope.
    pub fn request(
        correlation_id: impl Into<String>,
        command: impl Into<String>,
        payload: Value,
        reply_to: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            command: command.into(),
            payload,
            reply_to: Some(reply_to.into()),
            status: None,
            error: None,
        }
    }

    /// Build an ok reply echoing the request's correlation id.
    pub fn ok_reply(correlation_id: impl Into<String>, command: impl Into<String>, payload: Value) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            command: command.into(),
            payload,
            reply_to: None,
            status: Some(ReplyStatus::Ok),
            error: None,
        }
    }

    /// Build an error reply echoing the request's correlation id.
    pub fn error_reply(
        correlation_id: impl Into<String>,
        command: impl Into<String>,
        error: HandlerError,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            command: command.into(),
            payload: Value::Null,
            reply_to: None,
            status: Some(ReplyStatus::Error),
            error: Some(error),
        }
    }

    /// True if this envelope is a reply (carries a status).
    pub fn is_reply(&self) -> bool {
        self.status.is_some()
    }
}

/// Encode an envelope to its wire bytes.
///
/// # Errors
///
/// Returns `RpcError::Decode` if the payload is not representable in JSON
/// (e.g. a map with non-string keys smuggled in via `Value`).
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, RpcError> {
    serde_json::to_vec(envelope).map_err(|e| RpcError::Decode(format!("encode failed: {e}")))
}

/// Decode an envelope from wire bytes.
///
/// # Errors
///
/// Returns `RpcError::Decode` for malformed input. Never panics and never
/// produces a defaulted envelope from garbage.
pub fn decode(bytes: &[u8]) -> Result<Envelope, RpcError> {
    serde_json::from_slice(bytes).map_err(|e| RpcError::Decode(format!("decode failed: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_round_trip() {
        let env = Envelope::request(
            "corr-1",
            "create-rider",
            json!({"user_id": 1, "email": "a@b.com"}),
            "auth.reply.abc",
        );

        let bytes = encode(&env).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.correlation_id, "corr-1");
        assert_eq!(decoded.command, "create-rider");
        assert_eq!(decoded.payload["email"], "a@b.com");
        assert_eq!(decoded.reply_to.as_deref(), Some("auth.reply.abc"));
        assert!(decoded.status.is_none());
        assert!(!decoded.is_reply());
    }

    #[test]
    fn test_ok_reply_round_trip() {
        let env = Envelope::ok_reply("corr-2", "get-rider", json!({"id": 1}));

        let decoded = decode(&encode(&env).unwrap()).unwrap();

        assert_eq!(decoded.status, Some(ReplyStatus::Ok));
        assert!(decoded.reply_to.is_none());
        assert!(decoded.error.is_none());
        assert!(decoded.is_reply());
    }

    #[test]
    fn test_error_reply_round_trip() {
        let env = Envelope::error_reply(
            "corr-3",
            "get-rider",
            HandlerError::not_found("rider 42 does not exist"),
        );

        let decoded = decode(&encode(&env).unwrap()).unwrap();

        assert_eq!(decoded.status, Some(ReplyStatus::Error));
        let err = decoded.error.unwrap();
        assert_eq!(err.kind, "not-found");
        assert_eq!(err.message, "rider 42 does not exist");
    }

    #[test]
    fn test_decode_truncated_input_fails_cleanly() {
        let env = Envelope::request("corr-4", "login", json!({}), "reply");
        let mut bytes = encode(&env).unwrap();
        bytes.truncate(bytes.len() / 2);

        let result = decode(&bytes);
        assert!(matches!(result, Err(RpcError::Decode(_))));
    }

    #[test]
    fn test_decode_non_json_fails_cleanly() {
        assert!(matches!(decode(b"\x00\x01\x02"), Err(RpcError::Decode(_))));
        assert!(matches!(decode(b""), Err(RpcError::Decode(_))));
        assert!(matches!(decode(b"[1,2,3]"), Err(RpcError::Decode(_))));
    }

    #[test]
    fn test_reply_to_absent_on_replies_in_wire_form() {
        let env = Envelope::ok_reply("corr-5", "login", json!({"access_token": "t"}));
        let json = String::from_utf8(encode(&env).unwrap()).unwrap();

        assert!(!json.contains("reply_to"));
        assert!(json.contains("\"status\":\"ok\""));
    }

    #[test]
    fn test_payload_defaults_to_null_when_missing() {
        let decoded = decode(br#"{"correlation_id":"c","command":"ping"}"#).unwrap();
        assert_eq!(decoded.payload, Value::Null);
    }

    #[test]
    fn test_status_casing_on_wire() {
        let env = Envelope::error_reply("c", "x", HandlerError::internal("boom"));
        let json = String::from_utf8(encode(&env).unwrap()).unwrap();
        assert!(json.contains("\"status\":\"error\""));
    }
}
