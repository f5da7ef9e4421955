//! Deterministic token-hash embeddings.
//!
//! Bag-of-words vectors: each whitespace token hashes to a bucket, counts
//! are L2-normalised. No model weights, fully deterministic, and similar
//! texts land near each other - exactly what hermetic tests need.

use async_trait::async_trait;

use stg_domain::error::Result;
use stg_domain::ports::EmbeddingProvider;
use stg_domain::value_objects::Embedding;

pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_one(&self, text: &str) -> Embedding {
        if text.trim().is_empty() {
            return Embedding::zero(self.dimensions);
        }
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.to_lowercase().split_whitespace() {
            let bucket = (seahash::hash(token.as_bytes()) as usize) % self.dimensions;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Embedding::new(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "hash"
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let provider = HashEmbeddingProvider::new(384);
        let a = provider.embed("union based sqli").await.unwrap();
        let b = provider.embed("union based sqli").await.unwrap();
        assert_eq!(a, b);
        assert!((a.cosine_similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn blank_input_yields_the_zero_vector() {
        let provider = HashEmbeddingProvider::new(384);
        let embedding = provider.embed("   \n\t ").await.unwrap();
        assert!(embedding.is_zero());
        assert_eq!(embedding.dimensions, 384);
    }

    #[tokio::test]
    async fn overlapping_texts_score_higher_than_disjoint_ones() {
        let provider = HashEmbeddingProvider::new(384);
        let base = provider
            .embed("blind sqli with time delays in login form")
            .await
            .unwrap();
        let near = provider
            .embed("blind sqli with time delays in search form")
            .await
            .unwrap();
        let far = provider.embed("jwt algorithm confusion").await.unwrap();
        assert!(base.cosine_similarity(&near) > base.cosine_similarity(&far));
    }

    #[tokio::test]
    async fn vectors_are_unit_length() {
        let provider = HashEmbeddingProvider::new(64);
        let embedding = provider.embed("a b c d").await.unwrap();
        let norm: f32 = embedding.vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
