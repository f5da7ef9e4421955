//! Immutable value objects compared by value.

/// Fixed-dimension text embedding vector
pub mod embedding;
/// Host/port/protocol target key with normalisation rules
pub mod endpoint;
/// Strong-typed UUID identifiers
pub mod ids;

pub use embedding::Embedding;
pub use endpoint::{Protocol, TargetKey};
pub use ids::*;
