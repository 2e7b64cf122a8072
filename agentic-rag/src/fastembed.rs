//! Local sentence-embedding models through `fastembed` (ONNX runtime).
//!
//! Only available with the `fastembed` feature. Model weights are downloaded
//! to the fastembed cache on first use.

use std::sync::Arc;

use async_trait::async_trait;
use ::fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "fastembed";

/// Default sentence-embedding model.
pub const DEFAULT_FASTEMBED_MODEL: &str = "all-MiniLM-L6-v2";

fn resolve(name: &str) -> Option<(EmbeddingModel, usize)> {
    match name {
        "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            Some((EmbeddingModel::AllMiniLML6V2, 384))
        }
        "all-MiniLM-L12-v2" | "sentence-transformers/all-MiniLM-L12-v2" => {
            Some((EmbeddingModel::AllMiniLML12V2, 384))
        }
        "bge-small-en-v1.5" | "BAAI/bge-small-en-v1.5" => Some((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" | "BAAI/bge-base-en-v1.5" => Some((EmbeddingModel::BGEBaseENV15, 768)),
        _ => None,
    }
}

/// An [`EmbeddingProvider`] running a sentence-embedding model in-process.
///
/// Inference is CPU-bound, so each call runs on tokio's blocking pool.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl FastEmbedProvider {
    /// Load [`DEFAULT_FASTEMBED_MODEL`].
    pub fn new() -> Result<Self> {
        Self::from_name(DEFAULT_FASTEMBED_MODEL)
    }

    /// Load a model by its sentence-transformers or BAAI name.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for an unsupported name and
    /// [`RagError::EmbeddingError`] if the model fails to load.
    pub fn from_name(name: &str) -> Result<Self> {
        let (model, dimensions) = resolve(name)
            .ok_or_else(|| RagError::ConfigError(format!("unsupported fastembed model '{name}'")))?;

        info!(model = name, "loading sentence-embedding model");
        let embedding = TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(false))
            .map_err(|e| RagError::embedding(PROVIDER, format!("failed to load '{name}': {e}")))?;

        Ok(Self { model: Arc::new(embedding), model_name: name.to_string(), dimensions })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding(PROVIDER, "model returned no embeddings"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model_name, "embedding batch");

        let model = Arc::clone(&self.model);
        let owned: Vec<String> = texts.iter().map(|t| (*t).to_string()).collect();
        tokio::task::spawn_blocking(move || {
            model.embed(owned, None).map_err(|e| RagError::embedding(PROVIDER, e.to_string()))
        })
        .await
        .map_err(|e| RagError::embedding(PROVIDER, format!("embedding task failed: {e}")))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
