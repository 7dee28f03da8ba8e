//! Coordinates Service Library
//!
//! Rider location tracking for the Waypoint platform, exposed as broker
//! commands (`save-rider-coordinates`, `get-rider-coordinates`).

pub mod errors;
pub mod handlers;
pub mod store;

/// Default inbound destination for coordinate commands.
pub const DEFAULT_INBOUND_DESTINATION: &str = "coords.commands";
