//! RPC error types.
//!
//! Errors local to one message (decode failures, unknown commands, handler
//! failures) are contained by the listener and converted into error replies.
//! Transport errors propagate to whoever owns the connection lifecycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error kind carried on error replies for commands with no registered handler.
pub const UNKNOWN_COMMAND_KIND: &str = "unknown-command";

/// A typed failure produced by a command handler.
///
/// The `kind` is a stable, machine-readable discriminator (e.g. `not-found`,
/// `unauthorized`); the `message` is human-readable detail. Both travel in
/// the error reply envelope and surface to the original caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct HandlerError {
    /// Machine-readable error discriminator.
    pub kind: String,
    /// Human-readable detail.
    pub message: String,
}

impl HandlerError {
    /// Build a handler error from a kind and message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for `not-found` failures.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not-found", message)
    }

    /// Convenience constructor for `unauthorized` failures.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }

    /// Convenience constructor for `conflict` failures.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", message)
    }

    /// Convenience constructor for `invalid-payload` failures.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new("invalid-payload", message)
    }

    /// Convenience constructor for `internal` failures.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal", message)
    }
}

/// RPC error type.
///
/// A failed remote call carries enough information for the caller to tell
/// "remote said no" (`Remote`, `UnknownCommand`) from "no answer came back"
/// (`Timeout`, `Transport`).
#[derive(Debug, Error)]
pub enum RpcError {
    /// Malformed envelope on the wire. The listener skips the message and
    /// keeps consuming.
    #[error("Decode error: {0}")]
    Decode(String),

    /// No handler registered for the command. The listener replies with an
    /// error and keeps consuming; the client maps the reply back to this
    /// variant.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The remote handler signaled a failure.
    #[error("Remote error: {0}")]
    Remote(HandlerError),

    /// No reply arrived within the deadline. Local to the caller; the remote
    /// handler may still complete and its late reply is discarded.
    #[error("Timeout after {elapsed_ms}ms waiting for reply to '{command}'")]
    Timeout {
        /// Command that timed out.
        command: String,
        /// Configured deadline in milliseconds.
        elapsed_ms: u64,
    },

    /// Broker connection or publish failure. Surfaced to the caller of
    /// `send`/`publish`; the consume loop owner handles reconnection.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Two handlers registered under the same command name. Startup-time
    /// configuration error, never a runtime race.
    #[error("Duplicate command registration: {0}")]
    DuplicateCommand(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The client proxy's reply task is gone (proxy shut down while calls
    /// were in flight).
    #[error("Reply channel closed")]
    ChannelClosed,
}

impl From<HandlerError> for RpcError {
    fn from(err: HandlerError) -> Self {
        RpcError::Remote(err)
    }
}
