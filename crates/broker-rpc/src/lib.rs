//! Command-dispatch RPC over a message broker.
//!
//! Waypoint services never call each other directly: a caller issues a
//! named command with a payload, and this crate turns that into a
//! correlated message exchange over a transport that has no built-in
//! request/response semantics.
//!
//! # Pieces
//!
//! - [`transport`] — broker bindings behind one interface: Redis pub/sub
//!   (at-most-once) and Redis Streams (at-least-once with acknowledgment).
//! - [`envelope`] — the wire structure carrying command id, correlation
//!   id, reply destination, and payload.
//! - [`client::CommandClient`] — client proxy: correlation ids, pending
//!   calls, reply demultiplexing, per-call timeouts.
//! - [`listener::CommandListener`] — server side: consume loop, registry
//!   dispatch, reply publication, ack-after-reply.
//! - [`registry::CommandRegistry`] — command name to handler, built once
//!   at startup.
//! - [`config::BrokerConfig`] — connection URL, binding choice, inbound
//!   destination, default timeout, all from the environment.
//!
//! # Control flow
//!
//! ```text
//! CommandClient -> Transport -> (broker) -> CommandListener
//!      ^                                         |
//!      |                                   CommandRegistry -> handler
//!      |                                         |
//!      +------ (broker) <- Transport <-----------+
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let config = BrokerConfig::from_env()?;
//! let transport = transport::connect(&config).await?;
//!
//! // Server side
//! let registry = CommandRegistry::builder()
//!     .register("create-rider", handler_fn(|_ctx, payload| async move {
//!         Ok(payload)
//!     }))?
//!     .build();
//! let listener = CommandListener::new(Arc::clone(&transport), registry, "rider.commands");
//! tokio::spawn(listener.run(cancel_token.clone()));
//!
//! // Client side
//! let client = CommandClient::connect(transport, "rider.commands", config.default_timeout).await?;
//! let rider = client.send("create-rider", json!({"user_id": 1})).await?;
//! ```

#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod listener;
pub mod registry;
pub mod transport;

pub use client::CommandClient;
pub use config::{BrokerConfig, TransportKind};
pub use envelope::{Envelope, ReplyStatus};
pub use errors::{HandlerError, RpcError};
pub use listener::CommandListener;
pub use registry::{handler_fn, CommandHandler, CommandRegistry, HandlerContext};
pub use transport::{InboundMessage, Subscription, Transport};
