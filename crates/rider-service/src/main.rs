//! Rider Service
//!
//! Entry point for the Waypoint rider service. Consumes `create-rider` and
//! `get-rider` commands from the broker.

use broker_rpc::{transport, BrokerConfig, CommandListener};
use rider_service::handlers;
use rider_service::repository::RiderRepository;
use rider_service::DEFAULT_INBOUND_DESTINATION;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rider_service=debug,broker_rpc=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rider Service");

    // Load configuration
    let mut vars: HashMap<String, String> = env::vars().collect();
    vars.entry("INBOUND_DESTINATION".to_string())
        .or_insert_with(|| DEFAULT_INBOUND_DESTINATION.to_string());

    let broker_config = BrokerConfig::from_vars(&vars).map_err(|e| {
        error!("Failed to load broker configuration: {}", e);
        e
    })?;

    info!(
        inbound_destination = %broker_config.inbound_destination,
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

    let registry = handlers::build_registry(RiderRepository::new()).map_err(|e| {
        error!("Failed to build command registry: {}", e);
        e
    })?;

    let listener = CommandListener::new(
        Arc::clone(&transport),
        registry,
        broker_config.inbound_destination.clone(),
    );

    let cancel = CancellationToken::new();
    let listener_cancel = cancel.clone();
    let listener_task = tokio::spawn(async move { listener.run(listener_cancel).await });

    info!(
        inbound_destination = %broker_config.inbound_destination,
        "Rider Service consuming commands"
    );

    shutdown_signal().await;
    cancel.cancel();
    let _ = listener_task.await;

    info!("Rider Service shutdown complete");

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
