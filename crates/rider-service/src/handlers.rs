//! Command handlers for the rider service.

use crate::errors::RiderError;
use crate::repository::{Rider, RiderRepository};
use broker_rpc::{handler_fn, CommandRegistry, HandlerError, RpcError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

/// `create-rider` request payload.
#[derive(Debug, Deserialize)]
pub struct CreateRiderRequest {
    pub user_id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// `get-rider` request payload.
#[derive(Debug, Deserialize)]
pub struct GetRiderRequest {
    pub id: i64,
}

/// Build the rider command registry.
///
/// # Errors
///
/// Returns `RpcError::DuplicateCommand` on conflicting registrations.
pub fn build_registry(riders: RiderRepository) -> Result<CommandRegistry, RpcError> {
    let create_repo = riders.clone();
    let get_repo = riders;

    Ok(CommandRegistry::builder()
        .register(
            "create-rider",
            handler_fn(move |_ctx, payload| {
                let riders = create_repo.clone();
                async move { create_rider(riders, payload).await }
            }),
        )?
        .register(
            "get-rider",
            handler_fn(move |_ctx, payload| {
                let riders = get_repo.clone();
                async move { get_rider(riders, payload).await }
            }),
        )?
        .build())
}

async fn create_rider(riders: RiderRepository, payload: Value) -> Result<Value, HandlerError> {
    let request: CreateRiderRequest = serde_json::from_value(payload)
        .map_err(|e| RiderError::InvalidPayload(e.to_string()))?;

    let rider = riders
        .create(
            request.user_id,
            &request.email,
            request.first_name,
            request.last_name,
        )
        .await;

    info!(
        target: "rider.handlers",
        rider_id = rider.id,
        user_id = rider.user_id,
        "Rider profile ready"
    );

    rider_json(&rider)
}

async fn get_rider(riders: RiderRepository, payload: Value) -> Result<Value, HandlerError> {
    let request: GetRiderRequest = serde_json::from_value(payload)
        .map_err(|e| RiderError::InvalidPayload(e.to_string()))?;

    let rider = riders
        .get(request.id)
        .await
        .ok_or(RiderError::NotFound(request.id))?;

    rider_json(&rider)
}

fn rider_json(rider: &Rider) -> Result<Value, HandlerError> {
    serde_json::to_value(rider).map_err(|e| {
        HandlerError::internal(format!("rider profile unserializable: {e}"))
    })
}
