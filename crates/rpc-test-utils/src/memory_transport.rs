//! In-memory transport for broker-free RPC testing.
//!
//! Behaves like the pub/sub binding by default: messages published to a
//! destination with no subscriber are dropped. Delivery tags can be turned
//! on to exercise the ack-after-reply path; acknowledged tags are recorded
//! for assertions. Publish failures can be injected to test transport
//! error propagation.

use async_trait::async_trait;
use broker_rpc::errors::RpcError;
use broker_rpc::transport::{InboundMessage, Subscription, Transport};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Default)]
struct MemoryTransportInner {
    /// Active subscriber channels per destination (fanout).
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<InboundMessage>>>,
    /// Acknowledged (destination, delivery_tag) pairs, in ack order.
    acked: Vec<(String, String)>,
    /// Messages published with no subscriber attached (lost, like pub/sub).
    dropped: u64,
    /// Remaining publishes that should fail with a transport error.
    publish_failures: u32,
    /// Remaining subscribes that should fail with a transport error.
    subscribe_failures: u32,
}

/// In-memory broker implementing [`Transport`].
///
/// Cheaply cloneable; clones share the same broker state.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryTransportInner>>,
    /// Assigns delivery tags when enabled, mimicking the durable binding.
    tag_counter: Arc<AtomicU64>,
    with_delivery_tags: bool,
}

impl MemoryTransport {
    /// Create a transport with pub/sub semantics (no delivery tags).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that assigns delivery tags to every message, so
    /// tests can assert on acknowledgment behavior.
    pub fn with_delivery_tags() -> Self {
        Self {
            with_delivery_tags: true,
            ..Self::default()
        }
    }

    /// Make the next `count` publishes fail with a transport error.
    pub fn fail_next_publishes(&self, count: u32) {
        self.inner.lock().unwrap().publish_failures = count;
    }

    /// Make the next `count` subscribes fail with a transport error.
    pub fn fail_next_subscribes(&self, count: u32) {
        self.inner.lock().unwrap().subscribe_failures = count;
    }

    /// Drop all subscriptions on a destination, simulating connection loss.
    /// Subscribers observe end-of-stream on their next read.
    pub fn drop_subscribers(&self, destination: &str) {
        self.inner.lock().unwrap().subscribers.remove(destination);
    }

    /// Delivery tags acknowledged on a destination, in ack order.
    pub fn acked_tags(&self, destination: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .acked
            .iter()
            .filter(|(dest, _)| dest == destination)
            .map(|(_, tag)| tag.clone())
            .collect()
    }

    /// Number of messages published with no subscriber attached.
    pub fn dropped_count(&self) -> u64 {
        self.inner.lock().unwrap().dropped
    }

    /// Number of live subscriptions on a destination.
    pub fn subscriber_count(&self, destination: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .subscribers
            .get(destination)
            .map_or(0, |subs| subs.iter().filter(|s| !s.is_closed()).count())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), RpcError> {
        let delivery_tag = self
            .with_delivery_tags
            .then(|| format!("tag-{}", self.tag_counter.fetch_add(1, Ordering::Relaxed)));

        let mut inner = self.inner.lock().unwrap();

        if inner.publish_failures > 0 {
            inner.publish_failures -= 1;
            return Err(RpcError::Transport(format!(
                "injected publish failure on '{destination}'"
            )));
        }

        let message = InboundMessage {
            payload: Bytes::copy_from_slice(payload),
            delivery_tag,
        };

        let mut delivered = false;
        if let Some(subs) = inner.subscribers.get_mut(destination) {
            subs.retain(|sender| !sender.is_closed());
            for sender in subs.iter() {
                if sender.send(message.clone()).is_ok() {
                    delivered = true;
                }
            }
        }

        if !delivered {
            // At-most-once: nobody listening, message is gone.
            inner.dropped += 1;
        }

        Ok(())
    }

    async fn subscribe(&self, destination: &str) -> Result<Box<dyn Subscription>, RpcError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut inner = self.inner.lock().unwrap();

        if inner.subscribe_failures > 0 {
            inner.subscribe_failures -= 1;
            return Err(RpcError::Transport(format!(
                "injected subscribe failure on '{destination}'"
            )));
        }

        inner
            .subscribers
            .entry(destination.to_string())
            .or_default()
            .push(tx);

        Ok(Box::new(MemorySubscription { receiver: rx }))
    }

    async fn ack(&self, destination: &str, delivery_tag: &str) -> Result<(), RpcError> {
        self.inner
            .lock()
            .unwrap()
            .acked
            .push((destination.to_string(), delivery_tag.to_string()));
        Ok(())
    }
}

struct MemorySubscription {
    receiver: mpsc::UnboundedReceiver<InboundMessage>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next_message(&mut self) -> Result<Option<InboundMessage>, RpcError> {
        Ok(self.receiver.recv().await)
    }
}
