//! Embedding providers.

/// Local fastembed sentence-transformer provider
pub mod fastembed_provider;
/// Deterministic token-hash provider for tests and embedding-less setups
pub mod hash;

pub use fastembed_provider::FastEmbedProvider;
pub use hash::HashEmbeddingProvider;
