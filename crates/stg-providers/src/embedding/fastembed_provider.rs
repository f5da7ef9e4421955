//! Local fastembed provider.
//!
//! Wraps a small sentence-transformer model (384-dim by default). Model
//! inference is CPU-bound and runs on the blocking pool; blank inputs skip
//! the model and yield zero vectors.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use stg_domain::error::{Error, Result};
use stg_domain::ports::EmbeddingProvider;
use stg_domain::value_objects::Embedding;

pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimensions: usize,
}

impl FastEmbedProvider {
    /// Initialise the model; downloads weights on first use.
    ///
    /// # Errors
    ///
    /// Fails for unknown model names or when model initialisation fails.
    pub fn new(model_name: &str, dimensions: usize) -> Result<Self> {
        let model_kind = Self::model_for(model_name)?;
        let model = TextEmbedding::try_new(
            InitOptions::new(model_kind).with_show_download_progress(false),
        )
        .map_err(|e| Error::embedding(format!("failed to initialise '{model_name}': {e}")))?;
        info!(model = model_name, dimensions, "embedding model ready");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: model_name.to_owned(),
            dimensions,
        })
    }

    fn model_for(name: &str) -> Result<EmbeddingModel> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l6-v2-q" => Ok(EmbeddingModel::AllMiniLML6V2Q),
            "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            other => Err(Error::embedding(format!("unknown embedding model '{other}'"))),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        // Blank inputs map to the zero vector without touching the model.
        let work: Vec<(usize, String)> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, t)| (i, t.clone()))
            .collect();

        let mut vectors = vec![Embedding::zero(self.dimensions); texts.len()];
        if work.is_empty() {
            return Ok(vectors);
        }

        let model = Arc::clone(&self.model);
        let inputs: Vec<String> = work.iter().map(|(_, t)| t.clone()).collect();
        let raw = tokio::task::spawn_blocking(move || {
            let mut model = model.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            model.embed(inputs, None)
        })
        .await
        .map_err(|e| Error::embedding(format!("embedding task failed: {e}")))?
        .map_err(|e| Error::embedding(format!("model inference failed: {e}")))?;

        if raw.len() != work.len() {
            return Err(Error::embedding(format!(
                "model returned {} vectors for {} inputs",
                raw.len(),
                work.len()
            )));
        }
        for ((index, _), vector) in work.into_iter().zip(raw) {
            if vector.len() != self.dimensions {
                return Err(Error::embedding(format!(
                    "model produced {}-dim vector, expected {}",
                    vector.len(),
                    self.dimensions
                )));
            }
            vectors[index] = Embedding::new(vector);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        &self.model_name
    }
}
