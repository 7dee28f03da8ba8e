//! Authentication service configuration.
//!
//! Broker parameters come from [`broker_rpc::BrokerConfig`]; this adds the
//! auth-specific knobs. The JWT signing secret is protected by
//! `SecretString`.

use broker_rpc::RpcError;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;

/// Default inbound destination for auth commands.
pub const DEFAULT_INBOUND_DESTINATION: &str = "auth.commands";

/// Default rider service destination for rider provisioning.
pub const DEFAULT_RIDER_DESTINATION: &str = "rider.commands";

/// Default access token lifetime in seconds (1 hour).
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 3_600;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Auth-specific configuration, loaded from environment variables.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret for access tokens.
    /// Protected by `SecretString` to prevent accidental logging.
    pub jwt_secret: SecretString,

    /// Access token lifetime in seconds (default: 3600).
    pub token_ttl_seconds: u64,

    /// Destination of the rider service (default: `rider.commands`).
    pub rider_destination: String,

    /// bcrypt cost factor (default: 10).
    pub bcrypt_cost: u32,
}

/// Custom Debug implementation that redacts the signing secret.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("rider_destination", &self.rider_destination)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl AuthConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Config` when `JWT_SECRET` is missing or a numeric
    /// knob does not parse.
    pub fn from_env() -> Result<Self, RpcError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Same conditions as [`AuthConfig::from_env`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, RpcError> {
        let jwt_secret = SecretString::from(
            vars.get("JWT_SECRET")
                .ok_or_else(|| {
                    RpcError::Config("Missing required environment variable: JWT_SECRET".to_string())
                })?
                .clone(),
        );

        let token_ttl_seconds = match vars.get("TOKEN_TTL_SECONDS") {
            Some(raw) => raw.parse().map_err(|_| {
                RpcError::Config(format!("TOKEN_TTL_SECONDS must be an integer, got '{raw}'"))
            })?,
            None => DEFAULT_TOKEN_TTL_SECONDS,
        };

        let rider_destination = vars
            .get("RIDER_DESTINATION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_RIDER_DESTINATION.to_string());

        let bcrypt_cost = match vars.get("BCRYPT_COST") {
            Some(raw) => raw.parse().map_err(|_| {
                RpcError::Config(format!("BCRYPT_COST must be an integer, got '{raw}'"))
            })?,
            None => DEFAULT_BCRYPT_COST,
        };

        Ok(AuthConfig {
            jwt_secret,
            token_ttl_seconds,
            rider_destination,
            bcrypt_cost,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([("JWT_SECRET".to_string(), "test-secret-0123456789".to_string())])
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::from_vars(&base_vars()).expect("config should load");

        assert_eq!(config.jwt_secret.expose_secret(), "test-secret-0123456789");
        assert_eq!(config.token_ttl_seconds, DEFAULT_TOKEN_TTL_SECONDS);
        assert_eq!(config.rider_destination, DEFAULT_RIDER_DESTINATION);
        assert_eq!(config.bcrypt_cost, DEFAULT_BCRYPT_COST);
    }

    #[test]
    fn test_missing_jwt_secret() {
        let result = AuthConfig::from_vars(&HashMap::new());
        assert!(matches!(result, Err(RpcError::Config(msg)) if msg.contains("JWT_SECRET")));
    }

    #[test]
    fn test_custom_values() {
        let mut vars = base_vars();
        vars.insert("TOKEN_TTL_SECONDS".to_string(), "120".to_string());
        vars.insert("RIDER_DESTINATION".to_string(), "riders.inbox".to_string());
        vars.insert("BCRYPT_COST".to_string(), "4".to_string());

        let config = AuthConfig::from_vars(&vars).expect("config should load");
        assert_eq!(config.token_ttl_seconds, 120);
        assert_eq!(config.rider_destination, "riders.inbox");
        assert_eq!(config.bcrypt_cost, 4);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = AuthConfig::from_vars(&base_vars()).expect("config should load");
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("test-secret"));
    }
}
