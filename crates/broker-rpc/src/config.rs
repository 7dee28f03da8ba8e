//! Broker configuration.
//!
//! Configuration is loaded from environment variables. The broker URL is
//! protected by `SecretString` since it may embed credentials
//! (`redis://:password@host:port`).

use crate::errors::RpcError;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

/// Default reply deadline for a single command call.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default consumer group used by the durable stream binding.
pub const DEFAULT_CONSUMER_GROUP: &str = "waypoint";

/// Which broker binding a service runs on.
///
/// Both bindings expose identical behavior to the layers above; only the
/// delivery semantics differ (at-most-once vs at-least-once).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Redis pub/sub: at-most-once, nothing persisted, no acknowledgment.
    #[default]
    PubSub,
    /// Redis Streams with a consumer group: at-least-once, persisted until
    /// acknowledged, redelivered after a crash.
    Stream,
}

impl TransportKind {
    fn parse(value: &str) -> Result<Self, RpcError> {
        match value {
            "pubsub" => Ok(TransportKind::PubSub),
            "stream" => Ok(TransportKind::Stream),
            other => Err(RpcError::Config(format!(
                "BROKER_TRANSPORT must be 'pubsub' or 'stream', got '{other}'"
            ))),
        }
    }
}

/// Broker connection and RPC parameters for one service.
///
/// Loaded from environment variables. The broker URL is redacted in Debug
/// output.
#[derive(Clone)]
pub struct BrokerConfig {
    /// Broker connection URL (e.g. `redis://localhost:6379`).
    /// Protected by `SecretString` to prevent accidental logging.
    pub broker_url: SecretString,

    /// Which binding to run on (default: pub/sub).
    pub transport: TransportKind,

    /// This service's inbound command destination (e.g. `rider.commands`).
    pub inbound_destination: String,

    /// Default reply deadline for outbound calls.
    pub default_timeout: Duration,

    /// Consumer group name for the stream binding (default: `waypoint`).
    pub consumer_group: String,

    /// Consumer name within the group. Defaults to the inbound destination
    /// plus a random suffix so parallel instances never collide.
    pub consumer_name: String,
}

/// Custom Debug implementation that redacts the broker URL.
impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("broker_url", &"[REDACTED]")
            .field("transport", &self.transport)
            .field("inbound_destination", &self.inbound_destination)
            .field("default_timeout", &self.default_timeout)
            .field("consumer_group", &self.consumer_group)
            .field("consumer_name", &self.consumer_name)
            .finish()
    }
}

impl BrokerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Config` when `BROKER_URL` or `INBOUND_DESTINATION`
    /// is missing, or when `BROKER_TRANSPORT` names an unknown binding.
    pub fn from_env() -> Result<Self, RpcError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Same conditions as [`BrokerConfig::from_env`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, RpcError> {
        let broker_url = SecretString::from(
            vars.get("BROKER_URL")
                .ok_or_else(|| RpcError::Config("Missing required environment variable: BROKER_URL".to_string()))?
                .clone(),
        );

        let transport = match vars.get("BROKER_TRANSPORT") {
            Some(value) => TransportKind::parse(value)?,
            None => TransportKind::default(),
        };

        let inbound_destination = vars
            .get("INBOUND_DESTINATION")
            .ok_or_else(|| {
                RpcError::Config("Missing required environment variable: INBOUND_DESTINATION".to_string())
            })?
            .clone();

        let default_timeout_ms = match vars.get("RPC_TIMEOUT_MS") {
            Some(raw) => raw.parse().map_err(|_| {
                RpcError::Config(format!("RPC_TIMEOUT_MS must be an integer, got '{raw}'"))
            })?,
            None => DEFAULT_TIMEOUT_MS,
        };

        let consumer_group = vars
            .get("CONSUMER_GROUP")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONSUMER_GROUP.to_string());

        let consumer_name = vars.get("CONSUMER_NAME").cloned().unwrap_or_else(|| {
            let suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = suffix.get(..8).unwrap_or("00000000");
            format!("{inbound_destination}-{short_suffix}")
        });

        Ok(BrokerConfig {
            broker_url,
            transport,
            inbound_destination,
            default_timeout: Duration::from_millis(default_timeout_ms),
            consumer_group,
            consumer_name,
        })
    }
}
