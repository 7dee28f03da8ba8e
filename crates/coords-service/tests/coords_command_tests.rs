//! End-to-end tests for the coordinates command surface over an in-memory
//! broker.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use broker_rpc::{CommandClient, CommandListener, RpcError, Transport};
use coords_service::handlers;
use coords_service::store::CoordinateStore;
use rpc_test_utils::MemoryTransport;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const COORDS_DESTINATION: &str = "coords.commands";

async fn setup() -> (CommandClient, CancellationToken) {
    let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
    let cancel = CancellationToken::new();

    let registry =
        handlers::build_registry(CoordinateStore::new()).expect("registry should build");
    let listener = CommandListener::new(Arc::clone(&transport), registry, COORDS_DESTINATION);
    tokio::spawn(listener.run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let client = CommandClient::connect(transport, COORDS_DESTINATION, Duration::from_secs(5))
        .await
        .expect("client should connect");

    (client, cancel)
}

#[tokio::test]
async fn test_save_then_read_history_in_order() {
    let (client, cancel) = setup().await;

    client
        .send(
            "save-rider-coordinates",
            json!({ "rider": 8, "lat": 52.52, "lng": 13.40 }),
        )
        .await
        .expect("save should succeed");
    client
        .send(
            "save-rider-coordinates",
            json!({ "rider": 8, "lat": 52.53, "lng": 13.41 }),
        )
        .await
        .expect("save should succeed");

    let reply = client
        .send("get-rider-coordinates", json!({ "rider": 8 }))
        .await
        .expect("get should succeed");

    assert_eq!(reply["rider"], 8);
    let coordinates = reply["coordinates"].as_array().expect("array reply");
    assert_eq!(coordinates.len(), 2);
    assert_eq!(coordinates[0]["lat"], 52.52);
    assert_eq!(coordinates[1]["lat"], 52.53);

    cancel.cancel();
}

#[tokio::test]
async fn test_unknown_rider_has_empty_history() {
    let (client, cancel) = setup().await;

    let reply = client
        .send("get-rider-coordinates", json!({ "rider": 77 }))
        .await
        .expect("get should succeed");
    assert!(reply["coordinates"].as_array().expect("array reply").is_empty());

    cancel.cancel();
}

#[tokio::test]
async fn test_invalid_coordinates_rejected_and_not_stored() {
    let (client, cancel) = setup().await;

    let result = client
        .send(
            "save-rider-coordinates",
            json!({ "rider": 8, "lat": 123.0, "lng": 13.40 }),
        )
        .await;
    match result {
        Err(RpcError::Remote(err)) => assert_eq!(err.kind, "invalid-payload"),
        other => panic!("expected invalid-payload error, got {other:?}"),
    }

    let reply = client
        .send("get-rider-coordinates", json!({ "rider": 8 }))
        .await
        .expect("get should succeed");
    assert!(reply["coordinates"].as_array().expect("array reply").is_empty());

    cancel.cancel();
}
