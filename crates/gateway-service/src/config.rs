//! Gateway configuration.

use std::collections::HashMap;
use std::env;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default destinations of the backing services.
pub const DEFAULT_AUTH_DESTINATION: &str = "auth.commands";
pub const DEFAULT_RIDER_DESTINATION: &str = "rider.commands";
pub const DEFAULT_COORDS_DESTINATION: &str = "coords.commands";

/// Gateway-specific configuration, loaded from environment variables.
/// Every knob has a default; loading cannot fail.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to (default: `0.0.0.0:3000`).
    pub bind_address: String,

    /// Inbound destination of the auth service.
    pub auth_destination: String,

    /// Inbound destination of the rider service.
    pub rider_destination: String,

    /// Inbound destination of the coordinates service.
    pub coords_destination: String,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let get_or = |key: &str, default: &str| {
            vars.get(key).cloned().unwrap_or_else(|| default.to_string())
        };

        Self {
            bind_address: get_or("GATEWAY_BIND_ADDRESS", DEFAULT_BIND_ADDRESS),
            auth_destination: get_or("AUTH_DESTINATION", DEFAULT_AUTH_DESTINATION),
            rider_destination: get_or("RIDER_DESTINATION", DEFAULT_RIDER_DESTINATION),
            coords_destination: get_or("COORDS_DESTINATION", DEFAULT_COORDS_DESTINATION),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_vars(&HashMap::new());

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.auth_destination, DEFAULT_AUTH_DESTINATION);
        assert_eq!(config.rider_destination, DEFAULT_RIDER_DESTINATION);
        assert_eq!(config.coords_destination, DEFAULT_COORDS_DESTINATION);
    }

    #[test]
    fn test_custom_values() {
        let vars = HashMap::from([
            ("GATEWAY_BIND_ADDRESS".to_string(), "127.0.0.1:8080".to_string()),
            ("AUTH_DESTINATION".to_string(), "auth.inbox".to_string()),
        ]);

        let config = GatewayConfig::from_vars(&vars);
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.auth_destination, "auth.inbox");
        assert_eq!(config.rider_destination, DEFAULT_RIDER_DESTINATION);
    }
}
