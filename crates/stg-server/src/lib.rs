//! # MCP Surface
//!
//! The tool router, lenient parameter coercion, the response envelope, and
//! the read-only resource surface (`cookie-session://`, `prompt://`).
#![allow(missing_docs)]

/// Lenient parameter coercion with aggregated diagnostics
pub mod coerce;
/// Request parameter structs
pub mod requests;
/// Resource surface helpers
pub mod resources;
/// Tool response envelope
pub mod responses;
/// Tool implementations
pub mod router;
/// The server type and its MCP handler
pub mod server;

pub use server::{GatewayDeps, GatewayServer};
