//! Gateway Service Library
//!
//! HTTP front door for the Waypoint platform. Translates REST requests into
//! broker commands against the auth, rider, and coordinates services and
//! maps RPC failures back onto HTTP status codes.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `errors` - Error types and HTTP mapping
//! - `middleware` - Bearer-token authentication
//! - `routes` - Route table and request handlers

pub mod config;
pub mod errors;
pub mod middleware;
pub mod routes;
