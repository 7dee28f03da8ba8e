//! End-to-end tests for the command RPC core over the in-memory transport.
//!
//! Exercises the full path: client proxy -> transport -> listener ->
//! registry -> handler -> reply -> client proxy.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use broker_rpc::{
    handler_fn, CommandClient, CommandListener, CommandRegistry, HandlerError, RpcError, Transport,
};
use futures::future::join_all;
use rpc_test_utils::MemoryTransport;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);
const INBOUND: &str = "rider.commands";

/// Registry mirroring the rider service surface plus test helpers.
fn test_registry() -> CommandRegistry {
    CommandRegistry::builder()
        .register(
            "create-rider",
            handler_fn(|_ctx, payload| async move {
                Ok(json!({
                    "id": payload["userId"],
                    "email": payload["email"],
                }))
            }),
        )
        .unwrap()
        .register(
            "double",
            handler_fn(|_ctx, payload| async move {
                let n = payload["n"].as_i64().ok_or_else(|| {
                    HandlerError::invalid_payload("n must be an integer")
                })?;
                Ok(json!({ "doubled": n * 2 }))
            }),
        )
        .unwrap()
        .register(
            "slow-echo",
            handler_fn(|_ctx, payload| async move {
                let delay_ms = payload["delay_ms"].as_u64().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(payload)
            }),
        )
        .unwrap()
        .register(
            "always-fails",
            handler_fn(|_ctx, _payload| async move {
                Err(HandlerError::not_found("nothing here"))
            }),
        )
        .unwrap()
        .build()
}

/// Spin up a listener on the shared transport and return a connected client.
async fn setup(transport: &MemoryTransport) -> (CommandClient, CancellationToken) {
    let cancel = CancellationToken::new();
    let transport: Arc<dyn Transport> = Arc::new(transport.clone());

    let listener = CommandListener::new(Arc::clone(&transport), test_registry(), INBOUND);
    tokio::spawn(listener.run(cancel.clone()));

    // Let the listener's subscription attach before the first publish;
    // the pub/sub binding drops messages with no subscriber.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let client = CommandClient::connect(transport, INBOUND, TEST_TIMEOUT)
        .await
        .expect("client should connect");

    (client, cancel)
}

#[tokio::test]
async fn test_round_trip_fidelity() {
    let transport = MemoryTransport::new();
    let (client, cancel) = setup(&transport).await;

    let reply = client
        .send("create-rider", json!({"userId": 1, "email": "a@b.com"}))
        .await
        .expect("call should succeed");

    assert_eq!(reply, json!({"id": 1, "email": "a@b.com"}));
    cancel.cancel();
}

#[tokio::test]
async fn test_unknown_command_resolves_within_one_round_trip() {
    let transport = MemoryTransport::new();
    let (client, cancel) = setup(&transport).await;

    let started = Instant::now();
    let result = client.send("does-not-exist", json!({})).await;
    let elapsed = started.elapsed();

    assert!(
        matches!(result, Err(RpcError::UnknownCommand(ref cmd)) if cmd == "does-not-exist"),
        "expected UnknownCommand, got {result:?}"
    );
    // One round trip, not the full timeout window.
    assert!(
        elapsed < Duration::from_secs(1),
        "unknown command took {elapsed:?}"
    );
    cancel.cancel();
}

#[tokio::test]
async fn test_handler_failure_surfaces_as_remote_error() {
    let transport = MemoryTransport::new();
    let (client, cancel) = setup(&transport).await;

    let result = client.send("always-fails", json!({})).await;

    match result {
        Err(RpcError::Remote(err)) => {
            assert_eq!(err.kind, "not-found");
            assert_eq!(err.message, "nothing here");
        }
        other => panic!("expected Remote error, got {other:?}"),
    }
    cancel.cancel();
}

#[tokio::test]
async fn test_100_concurrent_calls_resolve_independently() {
    let transport = MemoryTransport::new();
    let (client, cancel) = setup(&transport).await;
    let client = Arc::new(client);

    let calls = (0..100i64).map(|n| {
        let client = Arc::clone(&client);
        async move {
            let reply = client.send("double", json!({ "n": n })).await?;
            Ok::<(i64, Value), RpcError>((n, reply))
        }
    });

    let results = join_all(calls).await;

    for result in results {
        let (n, reply) = result.expect("every call should succeed");
        // No cross-assignment: each reply matches its own request.
        assert_eq!(reply, json!({ "doubled": n * 2 }), "mismatch for n={n}");
    }
    cancel.cancel();
}

#[tokio::test]
async fn test_timeout_then_late_reply_is_discarded() {
    let transport = MemoryTransport::new();
    let (client, cancel) = setup(&transport).await;

    // Handler delayed well past the 50ms deadline.
    let started = Instant::now();
    let result = client
        .send_with_timeout("slow-echo", json!({"delay_ms": 200}), Duration::from_millis(50))
        .await;
    let elapsed = started.elapsed();

    assert!(
        matches!(result, Err(RpcError::Timeout { ref command, elapsed_ms: 50 }) if command == "slow-echo"),
        "expected Timeout, got {result:?}"
    );
    // Caller observes the failure at roughly the deadline, not at 200ms.
    assert!(elapsed < Duration::from_millis(150), "timed out after {elapsed:?}");

    // The handler's eventual reply (at ~200ms) lands after the pending call
    // is gone and must be silently dropped; other calls are unaffected.
    let reply = client.send("double", json!({"n": 21})).await.unwrap();
    assert_eq!(reply, json!({"doubled": 42}));

    tokio::time::sleep(Duration::from_millis(250)).await;

    // Client still fully functional after the late reply arrived.
    let reply = client.send("double", json!({"n": 4})).await.unwrap();
    assert_eq!(reply, json!({"doubled": 8}));
    cancel.cancel();
}

#[tokio::test]
async fn test_corrupted_message_does_not_kill_the_listener() {
    let transport = MemoryTransport::new();
    let (client, cancel) = setup(&transport).await;

    // Straight onto the inbound destination: truncated JSON, binary junk,
    // and a non-envelope document.
    transport.publish(INBOUND, b"{\"correlation_id\": \"c").await.unwrap();
    transport.publish(INBOUND, b"\x00\xff\x00\xff").await.unwrap();
    transport.publish(INBOUND, b"[1,2,3]").await.unwrap();

    // The next well-formed message is still processed.
    let reply = client.send("double", json!({"n": 3})).await.unwrap();
    assert_eq!(reply, json!({"doubled": 6}));
    cancel.cancel();
}

#[tokio::test]
async fn test_request_without_reply_to_is_skipped() {
    let transport = MemoryTransport::new();
    let (client, cancel) = setup(&transport).await;

    // A reply-shaped envelope (no reply_to) on the inbound destination.
    transport
        .publish(
            INBOUND,
            br#"{"correlation_id":"x","command":"double","payload":{"n":1},"status":"ok"}"#,
        )
        .await
        .unwrap();

    let reply = client.send("double", json!({"n": 5})).await.unwrap();
    assert_eq!(reply, json!({"doubled": 10}));
    cancel.cancel();
}

#[tokio::test]
async fn test_publish_failure_surfaces_to_caller() {
    let transport = MemoryTransport::new();
    let (client, cancel) = setup(&transport).await;

    transport.fail_next_publishes(1);

    let result = client.send("double", json!({"n": 1})).await;
    assert!(matches!(result, Err(RpcError::Transport(_))));

    // The failed call left no pending entry behind; the proxy keeps working.
    let reply = client.send("double", json!({"n": 2})).await.unwrap();
    assert_eq!(reply, json!({"doubled": 4}));
    cancel.cancel();
}

#[tokio::test]
async fn test_ack_happens_only_after_reply() {
    let transport = MemoryTransport::with_delivery_tags();
    let (client, cancel) = setup(&transport).await;

    assert!(transport.acked_tags(INBOUND).is_empty());

    let reply = client.send("double", json!({"n": 7})).await.unwrap();
    assert_eq!(reply, json!({"doubled": 14}));

    // Reply received by the caller implies the listener published first,
    // and the ack follows the publish.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.acked_tags(INBOUND).len(), 1);
    cancel.cancel();
}

#[tokio::test]
async fn test_undecodable_message_is_acked_not_redelivered() {
    let transport = MemoryTransport::with_delivery_tags();
    let (_client, cancel) = setup(&transport).await;

    transport.publish(INBOUND, b"not json").await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.acked_tags(INBOUND).len(), 1);
    cancel.cancel();
}

#[tokio::test]
async fn test_listener_resubscribes_after_subscription_loss() {
    let transport = MemoryTransport::new();
    let (client, cancel) = setup(&transport).await;

    // Kill the inbound subscription; the listener observes end-of-stream
    // and resubscribes.
    transport.drop_subscribers(INBOUND);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let reply = client.send("double", json!({"n": 9})).await.unwrap();
    assert_eq!(reply, json!({"doubled": 18}));
    cancel.cancel();
}

#[tokio::test]
async fn test_typed_call_round_trip() {
    #[derive(serde::Serialize)]
    struct DoubleRequest {
        n: i64,
    }

    #[derive(serde::Deserialize)]
    struct DoubleReply {
        doubled: i64,
    }

    let transport = MemoryTransport::new();
    let (client, cancel) = setup(&transport).await;

    let reply: DoubleReply = client
        .call("double", &DoubleRequest { n: 12 })
        .await
        .expect("typed call should succeed");

    assert_eq!(reply.doubled, 24);
    cancel.cancel();
}

#[tokio::test]
async fn test_two_clients_do_not_share_replies() {
    let transport = MemoryTransport::new();
    let (client_a, cancel) = setup(&transport).await;

    let shared: Arc<dyn Transport> = Arc::new(transport.clone());
    let client_b = CommandClient::connect(shared, INBOUND, TEST_TIMEOUT)
        .await
        .unwrap();

    assert_ne!(client_a.reply_destination(), client_b.reply_destination());

    let (a, b) = tokio::join!(
        client_a.send("double", json!({"n": 1})),
        client_b.send("double", json!({"n": 2})),
    );

    assert_eq!(a.unwrap(), json!({"doubled": 2}));
    assert_eq!(b.unwrap(), json!({"doubled": 4}));
    cancel.cancel();
}
