//! Rider Service Library
//!
//! Rider profile management for the Waypoint platform, exposed as broker
//! commands (`create-rider`, `get-rider`).

pub mod errors;
pub mod handlers;
pub mod repository;

/// Default inbound destination for rider commands.
pub const DEFAULT_INBOUND_DESTINATION: &str = "rider.commands";
