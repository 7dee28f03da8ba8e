//! Redis Streams binding with consumer groups.
//!
//! At-least-once delivery: entries persist until `XACK`'d. A consumer that
//! crashes between receipt and acknowledgment finds its pending entries
//! again on restart (same consumer name), so a message is redelivered
//! rather than silently lost. The listener acknowledges only after the
//! reply has been published.
//!
//! # Destination layout
//!
//! Each destination is one stream; message bodies live in a single `body`
//! field. Consumer groups are created lazily on first subscribe with
//! `MKSTREAM`, starting from id 0 so entries published before the first
//! subscriber are still delivered.

use crate::errors::RpcError;
use crate::transport::{InboundMessage, Subscription, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client};
use std::collections::VecDeque;
use tracing::{debug, error, warn};

/// Field name carrying the envelope bytes inside a stream entry.
const BODY_FIELD: &str = "body";

/// Entries fetched per `XREADGROUP` round trip.
const READ_BATCH_SIZE: usize = 16;

/// Block timeout for `XREADGROUP` in milliseconds. Bounded so a dropped
/// subscription releases its connection promptly.
const READ_BLOCK_MS: usize = 5_000;

/// Redis Streams transport binding.
#[derive(Clone)]
pub struct StreamTransport {
    /// Client kept for opening per-subscription read connections.
    client: Client,
    /// Shared connection for publish and ack (cheaply cloneable).
    connection: MultiplexedConnection,
    /// Consumer group this service reads as.
    group: String,
    /// Consumer name within the group. Must be stable across restarts for
    /// pending entries to be redelivered to this instance.
    consumer: String,
}

impl StreamTransport {
    /// Connect to the broker.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Transport` if the URL is invalid or the broker is
    /// unreachable.
    pub async fn connect(broker_url: &str, group: &str, consumer: &str) -> Result<Self, RpcError> {
        // Do NOT log broker_url; it may contain credentials.
        let client = Client::open(broker_url).map_err(|e| {
            error!(target: "rpc.transport.stream", error = %e, "Failed to open broker client");
            RpcError::Transport(format!("failed to open broker client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(target: "rpc.transport.stream", error = %e, "Failed to connect to broker");
                RpcError::Transport(format!("failed to connect to broker: {e}"))
            })?;

        Ok(Self {
            client,
            connection,
            group: group.to_string(),
            consumer: consumer.to_string(),
        })
    }

    /// Create the consumer group for a destination if it does not exist yet.
    async fn ensure_group(&self, destination: &str) -> Result<(), RpcError> {
        let mut conn = self.connection.clone();

        let created: Result<(), redis::RedisError> = conn
            .xgroup_create_mkstream(destination, &self.group, "0")
            .await;

        match created {
            Ok(()) => {
                debug!(
                    target: "rpc.transport.stream",
                    destination = %destination,
                    group = %self.group,
                    "Created consumer group"
                );
                Ok(())
            }
            // Group already exists; position is preserved across restarts.
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => {
                error!(
                    target: "rpc.transport.stream",
                    error = %e,
                    destination = %destination,
                    "Failed to create consumer group"
                );
                Err(RpcError::Transport(format!(
                    "failed to create consumer group on '{destination}': {e}"
                )))
            }
        }
    }
}

#[async_trait]
impl Transport for StreamTransport {
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), RpcError> {
        let mut conn = self.connection.clone();

        let _id: String = conn
            .xadd(destination, "*", &[(BODY_FIELD, payload)])
            .await
            .map_err(|e| {
                error!(
                    target: "rpc.transport.stream",
                    error = %e,
                    destination = %destination,
                    "Publish failed"
                );
                RpcError::Transport(format!("publish to '{destination}' failed: {e}"))
            })?;

        Ok(())
    }

    async fn subscribe(&self, destination: &str) -> Result<Box<dyn Subscription>, RpcError> {
        self.ensure_group(destination).await?;

        // Dedicated connection: XREADGROUP blocks, which would stall other
        // commands multiplexed onto a shared connection.
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(
                    target: "rpc.transport.stream",
                    error = %e,
                    destination = %destination,
                    "Failed to open read connection"
                );
                RpcError::Transport(format!("failed to open read connection: {e}"))
            })?;

        debug!(
            target: "rpc.transport.stream",
            destination = %destination,
            group = %self.group,
            consumer = %self.consumer,
            "Subscribed"
        );

        Ok(Box::new(StreamSubscription {
            connection: conn,
            destination: destination.to_string(),
            group: self.group.clone(),
            consumer: self.consumer.clone(),
            cursor: DrainCursor::new(),
            buffered: VecDeque::new(),
        }))
    }

    async fn ack(&self, destination: &str, delivery_tag: &str) -> Result<(), RpcError> {
        let mut conn = self.connection.clone();

        let acked: i64 = conn
            .xack(destination, &self.group, &[delivery_tag])
            .await
            .map_err(|e| {
                error!(
                    target: "rpc.transport.stream",
                    error = %e,
                    destination = %destination,
                    delivery_tag = %delivery_tag,
                    "Ack failed"
                );
                RpcError::Transport(format!("ack on '{destination}' failed: {e}"))
            })?;

        if acked == 0 {
            // Already acked or claimed by another consumer; harmless but
            // worth a signal.
            warn!(
                target: "rpc.transport.stream",
                destination = %destination,
                delivery_tag = %delivery_tag,
                "Ack matched no pending entry"
            );
        }

        // Fully-handled entries are deleted so streams do not grow without
        // bound. Each destination is read by a single consumer group, so no
        // other reader needs the entry after this point. Best-effort: a
        // failed delete leaves a stale acked entry, nothing worse.
        let deleted: Result<i64, redis::RedisError> =
            conn.xdel(destination, &[delivery_tag]).await;
        if let Err(e) = deleted {
            warn!(
                target: "rpc.transport.stream",
                error = %e,
                destination = %destination,
                delivery_tag = %delivery_tag,
                "Failed to delete acked entry"
            );
        }

        Ok(())
    }
}

/// Read position during pending-entry recovery.
///
/// A fresh subscription first replays this consumer's pending entries:
/// messages delivered before a crash but never acknowledged. History reads
/// (`XREADGROUP` with an explicit id) return pending entries *after* that
/// id regardless of ack state, so the cursor must move past each delivered
/// batch — re-reading from `0` would hand out the same entries again until
/// their acks land. An empty history read means the backlog is replayed and
/// reads switch to new entries (`>`) for good.
struct DrainCursor {
    position: Option<String>,
}

impl DrainCursor {
    fn new() -> Self {
        Self {
            position: Some("0".to_string()),
        }
    }

    fn is_draining(&self) -> bool {
        self.position.is_some()
    }

    /// The id to pass to the next `XREADGROUP`.
    fn read_id(&self) -> &str {
        self.position.as_deref().unwrap_or(">")
    }

    /// Record the outcome of one history read.
    fn advance(&mut self, last_delivered_id: Option<&str>) {
        if !self.is_draining() {
            return;
        }
        self.position = last_delivered_id.map(ToString::to_string);
    }
}

/// One held stream subscription reading as a group consumer.
struct StreamSubscription {
    connection: MultiplexedConnection,
    destination: String,
    group: String,
    consumer: String,
    cursor: DrainCursor,
    buffered: VecDeque<InboundMessage>,
}

impl StreamSubscription {
    async fn read_batch(&mut self) -> Result<Vec<InboundMessage>, RpcError> {
        let read_id = self.cursor.read_id().to_string();

        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(READ_BATCH_SIZE)
            .block(READ_BLOCK_MS);

        let reply: StreamReadReply = self
            .connection
            .xread_options(&[&self.destination], &[&read_id], &options)
            .await
            .map_err(|e| {
                error!(
                    target: "rpc.transport.stream",
                    error = %e,
                    destination = %self.destination,
                    "Stream read failed"
                );
                RpcError::Transport(format!("read on '{}' failed: {e}", self.destination))
            })?;

        let mut messages = Vec::new();
        // The cursor must move past every returned entry, including ones
        // skipped below, or the next history read would return them again.
        let mut last_id: Option<String> = None;

        for key in reply.keys {
            for entry in key.ids {
                last_id = Some(entry.id.clone());

                let Some(value) = entry.map.get(BODY_FIELD) else {
                    // Entry written outside this codec.
                    warn!(
                        target: "rpc.transport.stream",
                        destination = %self.destination,
                        entry_id = %entry.id,
                        "Stream entry missing body field, skipping"
                    );
                    continue;
                };

                let body: Vec<u8> = redis::from_redis_value(value).map_err(|e| {
                    RpcError::Transport(format!("stream entry body unreadable: {e}"))
                })?;

                messages.push(InboundMessage {
                    payload: Bytes::from(body),
                    delivery_tag: Some(entry.id.clone()),
                });
            }
        }

        if self.cursor.is_draining() {
            if last_id.is_some() {
                debug!(
                    target: "rpc.transport.stream",
                    destination = %self.destination,
                    count = messages.len(),
                    "Redelivering pending entries"
                );
            }
            self.cursor.advance(last_id.as_deref());
        }

        Ok(messages)
    }
}

#[async_trait]
impl Subscription for StreamSubscription {
    async fn next_message(&mut self) -> Result<Option<InboundMessage>, RpcError> {
        loop {
            if let Some(message) = self.buffered.pop_front() {
                return Ok(Some(message));
            }

            // Empty batch: either the pending backlog is replayed (the
            // cursor just switched to new entries) or a blocked read timed
            // out with nothing new. Keep reading either way.
            let batch = self.read_batch().await?;
            self.buffered.extend(batch);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_starts_at_history_origin() {
        let cursor = DrainCursor::new();
        assert!(cursor.is_draining());
        assert_eq!(cursor.read_id(), "0");
    }

    #[test]
    fn test_cursor_moves_past_delivered_entries() {
        let mut cursor = DrainCursor::new();

        // A batch was delivered; the next read must start after its last
        // entry, not from 0, even though nothing is acked yet.
        cursor.advance(Some("1700000000000-4"));
        assert!(cursor.is_draining());
        assert_eq!(cursor.read_id(), "1700000000000-4");

        cursor.advance(Some("1700000000001-0"));
        assert_eq!(cursor.read_id(), "1700000000001-0");
    }

    #[test]
    fn test_empty_history_read_switches_to_new_entries() {
        let mut cursor = DrainCursor::new();
        cursor.advance(Some("1700000000000-1"));

        cursor.advance(None);
        assert!(!cursor.is_draining());
        assert_eq!(cursor.read_id(), ">");
    }

    #[test]
    fn test_cursor_never_reenters_drain_mode() {
        let mut cursor = DrainCursor::new();
        cursor.advance(None);

        // Ids seen on live reads must not drag the cursor back into
        // history replay.
        cursor.advance(Some("1700000000002-0"));
        assert!(!cursor.is_draining());
        assert_eq!(cursor.read_id(), ">");
    }
}
