//! Authentication Service Library
//!
//! Registration, login, and token validation for the Waypoint platform,
//! exposed as broker commands. Registration also provisions a rider profile
//! by calling the rider service over the same RPC core.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `errors` - Error types
//! - `handlers` - Command handlers and registry wiring
//! - `repository` - User storage
//! - `tokens` - Access token issuance and verification

pub mod config;
pub mod errors;
pub mod handlers;
pub mod repository;
pub mod tokens;
