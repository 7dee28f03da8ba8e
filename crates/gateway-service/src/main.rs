//! Gateway Service
//!
//! Entry point for the Waypoint HTTP gateway.

use broker_rpc::{transport, BrokerConfig, CommandClient};
use gateway_service::config::GatewayConfig;
use gateway_service::routes::{self, AppState};
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway_service=debug,broker_rpc=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gateway Service");

    // Load configuration. The gateway consumes no command destination of
    // its own; the broker layer still wants one for reply naming.
    let mut vars: HashMap<String, String> = env::vars().collect();
    vars.entry("INBOUND_DESTINATION".to_string())
        .or_insert_with(|| "gateway".to_string());

    let broker_config = BrokerConfig::from_vars(&vars).map_err(|e| {
        error!("Failed to load broker configuration: {}", e);
        e
    })?;
    let gateway_config = GatewayConfig::from_env();

    info!(
        bind_address = %gateway_config.bind_address,
        transport = ?broker_config.transport,
        "Configuration loaded successfully"
    );

    // Connect to the broker
    info!("Connecting to broker...");
    let transport = transport::connect(&broker_config).await.map_err(|e| {
        error!("Failed to connect to broker: {}", e);
        e
    })?;
    info!("Broker connection established");

    // One client proxy per backing service
    let auth = Arc::new(
        CommandClient::connect(
            Arc::clone(&transport),
            gateway_config.auth_destination.clone(),
            broker_config.default_timeout,
        )
        .await?,
    );
    let riders = Arc::new(
        CommandClient::connect(
            Arc::clone(&transport),
            gateway_config.rider_destination.clone(),
            broker_config.default_timeout,
        )
        .await?,
    );
    let coords = Arc::new(
        CommandClient::connect(
            Arc::clone(&transport),
            gateway_config.coords_destination.clone(),
            broker_config.default_timeout,
        )
        .await?,
    );

    let state = Arc::new(AppState {
        auth,
        riders,
        coords,
    });

    // Build application routes
    let app = routes::build_routes(state);

    // Parse bind address
    let addr: SocketAddr = gateway_config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Gateway Service listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
