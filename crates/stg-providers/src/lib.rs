//! # Provider Layer
//!
//! Concrete implementations of the domain ports: the Postgres + pgvector
//! store, the fastembed and deterministic-hash embedding providers, and the
//! reqwest HTTP transport.
#![allow(missing_docs)]

/// Postgres repositories and schema bootstrap
pub mod database;
/// Embedding providers
pub mod embedding;
/// HTTP transport
pub mod http;

pub use embedding::{FastEmbedProvider, HashEmbeddingProvider};
pub use http::ReqwestTransport;
