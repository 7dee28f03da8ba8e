//! # RPC Test Utilities
//!
//! Shared test utilities for Waypoint's broker RPC core.
//!
//! Provides an in-memory [`Transport`](broker_rpc::Transport)
//! implementation so client proxies and command listeners can be tested
//! end to end without a running broker.
//!
//! ## Modules
//!
//! - `memory_transport` - In-memory broker with pub/sub fanout, optional
//!   delivery tags, ack recording, and failure injection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rpc_test_utils::MemoryTransport;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let transport = Arc::new(MemoryTransport::new());
//!     let listener = CommandListener::new(Arc::clone(&transport), registry, "svc.commands");
//!     tokio::spawn(listener.run(cancel.clone()));
//!
//!     let client = CommandClient::connect(transport, "svc.commands", timeout).await.unwrap();
//!     let reply = client.send("echo", json!({"x": 1})).await.unwrap();
//! }
//! ```

mod memory_transport;

pub use memory_transport::MemoryTransport;
