//! Command handlers for the coordinates service.

use crate::errors::CoordsError;
use crate::store::CoordinateStore;
use broker_rpc::{handler_fn, CommandRegistry, HandlerError, RpcError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// `save-rider-coordinates` request payload.
#[derive(Debug, Deserialize)]
pub struct SaveCoordinatesRequest {
    pub rider: i64,
    pub lat: f64,
    pub lng: f64,
}

/// `get-rider-coordinates` request payload.
#[derive(Debug, Deserialize)]
pub struct GetCoordinatesRequest {
    pub rider: i64,
}

/// Build the coordinates command registry.
///
/// # Errors
///
/// Returns `RpcError::DuplicateCommand` on conflicting registrations.
pub fn build_registry(store: CoordinateStore) -> Result<CommandRegistry, RpcError> {
    let save_store = store.clone();
    let get_store = store;

    Ok(CommandRegistry::builder()
        .register(
            "save-rider-coordinates",
            handler_fn(move |_ctx, payload| {
                let store = save_store.clone();
                async move { save_coordinates(store, payload).await }
            }),
        )?
        .register(
            "get-rider-coordinates",
            handler_fn(move |_ctx, payload| {
                let store = get_store.clone();
                async move { get_coordinates(store, payload).await }
            }),
        )?
        .build())
}

async fn save_coordinates(store: CoordinateStore, payload: Value) -> Result<Value, HandlerError> {
    let request: SaveCoordinatesRequest = serde_json::from_value(payload)
        .map_err(|e| CoordsError::InvalidPayload(e.to_string()))?;

    validate_coordinate(request.lat, request.lng)?;

    let sample = store.save(request.rider, request.lat, request.lng).await;

    debug!(
        target: "coords.handlers",
        rider = request.rider,
        lat = sample.lat,
        lng = sample.lng,
        "Coordinate recorded"
    );

    serde_json::to_value(&sample)
        .map_err(|e| HandlerError::internal(format!("sample unserializable: {e}")))
}

async fn get_coordinates(store: CoordinateStore, payload: Value) -> Result<Value, HandlerError> {
    let request: GetCoordinatesRequest = serde_json::from_value(payload)
        .map_err(|e| CoordsError::InvalidPayload(e.to_string()))?;

    let history = store.history(request.rider).await;
    let coordinates = serde_json::to_value(&history)
        .map_err(|e| HandlerError::internal(format!("history unserializable: {e}")))?;

    Ok(json!({ "rider": request.rider, "coordinates": coordinates }))
}

fn validate_coordinate(lat: f64, lng: f64) -> Result<(), CoordsError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(CoordsError::OutOfRange(format!(
            "latitude {lat} outside [-90, 90]"
        )));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(CoordsError::OutOfRange(format!(
            "longitude {lng} outside [-180, 180]"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_get() {
        let store = CoordinateStore::new();

        let saved = save_coordinates(
            store.clone(),
            json!({ "rider": 1, "lat": 52.52, "lng": 13.40 }),
        )
        .await
        .unwrap();
        assert_eq!(saved["lat"], 52.52);
        assert!(saved["recorded_at"].is_string());

        let reply = get_coordinates(store, json!({ "rider": 1 })).await.unwrap();
        assert_eq!(reply["rider"], 1);
        assert_eq!(reply["coordinates"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_rider_reads_as_empty_history() {
        let store = CoordinateStore::new();
        let reply = get_coordinates(store, json!({ "rider": 9 })).await.unwrap();
        assert!(reply["coordinates"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_latitude_rejected() {
        let store = CoordinateStore::new();
        let err = save_coordinates(store, json!({ "rider": 1, "lat": 91.0, "lng": 0.0 }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "invalid-payload");
        assert!(err.message.contains("latitude"));
    }

    #[tokio::test]
    async fn test_out_of_range_longitude_rejected() {
        let store = CoordinateStore::new();
        let err = save_coordinates(store, json!({ "rider": 1, "lat": 0.0, "lng": -180.5 }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "invalid-payload");
        assert!(err.message.contains("longitude"));
    }

    #[tokio::test]
    async fn test_non_numeric_payload_rejected() {
        let store = CoordinateStore::new();
        let err = save_coordinates(store, json!({ "rider": 1, "lat": "north", "lng": 0.0 }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "invalid-payload");
    }
}
