//! Transport bindings over the message broker.
//!
//! A [`Transport`] wraps one concrete broker mechanism behind a single
//! interface: publish bytes to a named destination, subscribe to a
//! destination and receive raw messages, acknowledge a received message
//! where the binding supports it. Callers above this layer never need to
//! know which binding is active.
//!
//! Two bindings ship:
//!
//! - [`pubsub::PubSubTransport`]: Redis pub/sub. At-most-once; messages
//!   published while no subscriber is attached are lost; ack is a no-op.
//! - [`stream::StreamTransport`]: Redis Streams with a consumer group.
//!   At-least-once; entries persist until acknowledged and are redelivered
//!   after a crash between receipt and handling.
//!
//! Connections are owned by the transport object: acquired in `connect`,
//! released when the last clone is dropped. There is no ambient client
//! singleton.

pub mod pubsub;
pub mod stream;

use crate::config::{BrokerConfig, TransportKind};
use crate::errors::RpcError;
use async_trait::async_trait;
use bytes::Bytes;
use secrecy::ExposeSecret;
use std::sync::Arc;

pub use pubsub::PubSubTransport;
pub use stream::StreamTransport;

/// A raw message received from a subscription.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Undecoded message body.
    pub payload: Bytes,
    /// Broker-level id for acknowledgment. `None` on bindings without
    /// acknowledgment (pub/sub).
    pub delivery_tag: Option<String>,
}

/// A held subscription to one destination.
///
/// Dropping the subscription releases the underlying broker resources on
/// every exit path, including failure of the owning component.
#[async_trait]
pub trait Subscription: Send {
    /// Receive the next raw message.
    ///
    /// Returns `Ok(None)` if the subscription has ended cleanly.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Transport` when the broker connection fails; the
    /// owner of the consume loop decides whether to reconnect.
    async fn next_message(&mut self) -> Result<Option<InboundMessage>, RpcError>;
}

/// One concrete broker binding.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Fire-and-forget delivery attempt. No guarantee beyond what the
    /// underlying broker offers.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Transport` when the publish cannot be handed to
    /// the broker.
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), RpcError>;

    /// Subscribe to a destination, producing a lazy, unbounded sequence of
    /// raw messages for as long as the subscription is held.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Transport` when the subscription cannot be
    /// established.
    async fn subscribe(&self, destination: &str) -> Result<Box<dyn Subscription>, RpcError>;

    /// Acknowledge a received message. No-op on bindings without
    /// acknowledgment. The listener calls this only after the reply has
    /// been published, so a crash between receipt and handling leads to
    /// redelivery rather than silent loss.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Transport` when the acknowledgment cannot be
    /// delivered.
    async fn ack(&self, destination: &str, delivery_tag: &str) -> Result<(), RpcError>;
}

/// Connect the binding named by the configuration.
///
/// # Errors
///
/// Returns `RpcError::Transport` when the broker is unreachable.
pub async fn connect(config: &BrokerConfig) -> Result<Arc<dyn Transport>, RpcError> {
    let url = config.broker_url.expose_secret();
    match config.transport {
        TransportKind::PubSub => Ok(Arc::new(PubSubTransport::connect(url).await?)),
        TransportKind::Stream => Ok(Arc::new(
            StreamTransport::connect(url, &config.consumer_group, &config.consumer_name).await?,
        )),
    }
}
