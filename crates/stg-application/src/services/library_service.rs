//! Technique library curation and similarity search.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use stg_domain::entities::{LibraryEntry, LibraryStats};
use stg_domain::error::{Error, Result};
use stg_domain::ports::{EmbeddingProvider, NewLibraryEntry};
use stg_domain::value_objects::EntryId;

use crate::store::Store;

/// Similarity at or above which a new entry is rejected as a duplicate.
pub const DUPLICATE_THRESHOLD: f32 = 0.9;

/// Library use cases.
pub struct LibraryService {
    store: Option<Store>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl LibraryService {
    #[must_use]
    pub fn new(store: Option<Store>, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { store, embedder }
    }

    /// Add an entry unless an existing one is at least 0.9 similar to the content.
    ///
    /// # Errors
    ///
    /// Fails with `duplicate` (carrying the conflicting id) when the guard
    /// trips, and `validation_failed` when embeddings are unavailable.
    pub async fn add(
        &self,
        title: String,
        content: String,
        category: String,
        tags: Vec<String>,
        metadata: HashMap<String, Value>,
    ) -> Result<LibraryEntry> {
        let store = Store::require(self.store.as_ref())?;
        let embedding = self.require_embedder()?.embed(&content).await?;

        let near = store
            .library
            .search_by_vector(&embedding, 1, DUPLICATE_THRESHOLD, None)
            .await?;
        if let Some((existing, score)) = near.first() {
            return Err(Error::duplicate(
                format!(
                    "existing entry '{}' is {score:.2} similar to the new content",
                    existing.title
                ),
                existing.id.as_str(),
            ));
        }

        store
            .library
            .add(NewLibraryEntry {
                title,
                content,
                category,
                tags,
                metadata,
                content_embedding: Some(embedding),
            })
            .await
    }

    /// Cosine search over entry content; bumps usage stats on the hits.
    ///
    /// # Errors
    ///
    /// Fails with `validation_failed` when embeddings are unavailable.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        min_similarity: f32,
        category: Option<&str>,
    ) -> Result<Vec<(LibraryEntry, f32)>> {
        let store = Store::require(self.store.as_ref())?;
        let query = self.require_embedder()?.embed(query).await?;
        let hits = store
            .library
            .search_by_vector(&query, k, min_similarity, category)
            .await?;

        let ids: Vec<EntryId> = hits.iter().map(|(entry, _)| entry.id).collect();
        if !ids.is_empty() {
            store.library.record_usage(&ids).await?;
        }
        Ok(hits)
    }

    /// # Errors
    ///
    /// Fails when the store is unavailable.
    pub async fn stats(&self) -> Result<LibraryStats> {
        let store = Store::require(self.store.as_ref())?;
        store.library.stats().await
    }

    fn require_embedder(&self) -> Result<&Arc<dyn EmbeddingProvider>> {
        self.embedder.as_ref().ok_or_else(|| {
            Error::validation(
                "embeddings_unavailable: the embedding model is disabled",
                vec![],
            )
        })
    }
}
