//! HTTP transport.

/// reqwest-backed transport implementation
pub mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;
