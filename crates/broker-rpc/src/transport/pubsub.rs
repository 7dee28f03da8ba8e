//! Redis pub/sub binding.
//!
//! At-most-once delivery: nothing is persisted, there is no acknowledgment,
//! and a message published while no subscriber is attached is lost. The
//! publish side uses a `MultiplexedConnection`, which is cheap to clone and
//! safe to use concurrently; each subscription holds its own dedicated
//! pub/sub connection.

use crate::errors::RpcError;
use crate::transport::{InboundMessage, Subscription, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Msg};
use std::pin::Pin;
use tracing::{debug, error};

type MessageStream = Pin<Box<dyn futures::Stream<Item = Msg> + Send>>;

/// Redis pub/sub transport binding.
#[derive(Clone)]
pub struct PubSubTransport {
    /// Client kept for opening per-subscription pub/sub connections.
    client: Client,
    /// Shared publish connection (cheaply cloneable, concurrent-safe).
    connection: MultiplexedConnection,
}

impl PubSubTransport {
    /// Connect to the broker.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Transport` if the URL is invalid or the broker is
    /// unreachable.
    pub async fn connect(broker_url: &str) -> Result<Self, RpcError> {
        // Do NOT log broker_url; it may contain credentials.
        let client = Client::open(broker_url).map_err(|e| {
            error!(target: "rpc.transport.pubsub", error = %e, "Failed to open broker client");
            RpcError::Transport(format!("failed to open broker client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(target: "rpc.transport.pubsub", error = %e, "Failed to connect to broker");
                RpcError::Transport(format!("failed to connect to broker: {e}"))
            })?;

        Ok(Self { client, connection })
    }
}

#[async_trait]
impl Transport for PubSubTransport {
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), RpcError> {
        let mut conn = self.connection.clone();

        let receivers: i64 = conn.publish(destination, payload).await.map_err(|e| {
            error!(
                target: "rpc.transport.pubsub",
                error = %e,
                destination = %destination,
                "Publish failed"
            );
            RpcError::Transport(format!("publish to '{destination}' failed: {e}"))
        })?;

        if receivers == 0 {
            // At-most-once: no subscriber means the message is gone.
            debug!(
                target: "rpc.transport.pubsub",
                destination = %destination,
                "Published with no subscribers attached"
            );
        }

        Ok(())
    }

    async fn subscribe(&self, destination: &str) -> Result<Box<dyn Subscription>, RpcError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|e| {
            error!(
                target: "rpc.transport.pubsub",
                error = %e,
                destination = %destination,
                "Failed to open subscription connection"
            );
            RpcError::Transport(format!("failed to open subscription connection: {e}"))
        })?;

        pubsub.subscribe(destination).await.map_err(|e| {
            error!(
                target: "rpc.transport.pubsub",
                error = %e,
                destination = %destination,
                "Subscribe failed"
            );
            RpcError::Transport(format!("subscribe to '{destination}' failed: {e}"))
        })?;

        debug!(target: "rpc.transport.pubsub", destination = %destination, "Subscribed");

        Ok(Box::new(PubSubSubscription {
            messages: Box::pin(pubsub.into_on_message()),
        }))
    }

    async fn ack(&self, _destination: &str, _delivery_tag: &str) -> Result<(), RpcError> {
        // Pub/sub has no acknowledgment; delivery is at-most-once.
        Ok(())
    }
}

/// One held pub/sub subscription. Dropping it unsubscribes and releases the
/// dedicated connection.
struct PubSubSubscription {
    messages: MessageStream,
}

#[async_trait]
impl Subscription for PubSubSubscription {
    async fn next_message(&mut self) -> Result<Option<InboundMessage>, RpcError> {
        match self.messages.next().await {
            Some(msg) => Ok(Some(InboundMessage {
                payload: Bytes::copy_from_slice(msg.get_payload_bytes()),
                delivery_tag: None,
            })),
            // Stream end means the connection is gone; the consume loop
            // owner decides whether to resubscribe.
            None => Ok(None),
        }
    }
}
