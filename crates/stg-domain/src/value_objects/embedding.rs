//! Fixed-dimension embedding vectors and cosine similarity.

use serde::{Deserialize, Serialize};

/// Text embedding vector of fixed dimension.
///
/// All embeddings stored by the gateway share one dimension (384 by default);
/// blank input maps to the zero vector rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// Raw vector components
    pub vector: Vec<f32>,
    /// Number of components; always equals `vector.len()`
    pub dimensions: usize,
}

impl Embedding {
    /// Wrap a raw vector.
    #[must_use]
    pub fn new(vector: Vec<f32>) -> Self {
        let dimensions = vector.len();
        Self { vector, dimensions }
    }

    /// The zero vector of the given dimension.
    #[must_use]
    pub fn zero(dimensions: usize) -> Self {
        Self {
            vector: vec![0.0; dimensions],
            dimensions,
        }
    }

    /// True when every component is zero (blank-input sentinel).
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.vector.iter().all(|v| *v == 0.0)
    }

    /// Cosine similarity in `[-1, 1]`; zero vectors yield 0.
    #[must_use]
    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        if self.dimensions != other.dimensions {
            return 0.0;
        }
        let dot: f32 = self
            .vector
            .iter()
            .zip(other.vector.iter())
            .map(|(a, b)| a * b)
            .sum();
        let norm_a: f32 = self.vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        let norm_b: f32 = other.vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}
