//! Configuration shared by ingestion and retrieval.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::vectorstore::DistanceMetric;

/// Environment variable overriding [`RagConfig::db_path`].
pub const ENV_DB_PATH: &str = "AGENTIC_RAG_DB_PATH";
/// Environment variable overriding [`RagConfig::collection_name`].
pub const ENV_COLLECTION: &str = "AGENTIC_RAG_COLLECTION";
/// Environment variable overriding [`RagConfig::documents_dir`].
pub const ENV_DOCS_DIR: &str = "AGENTIC_RAG_DOCS_DIR";
/// Environment variable overriding [`RagConfig::embedding_model`].
pub const ENV_EMBEDDING_MODEL: &str = "AGENTIC_RAG_EMBEDDING_MODEL";
/// Environment variable overriding [`RagConfig::top_k`].
pub const ENV_TOP_K: &str = "AGENTIC_RAG_TOP_K";
/// Environment variable overriding [`RagConfig::distance`].
pub const ENV_DISTANCE: &str = "AGENTIC_RAG_DISTANCE";

/// Configuration for ingestion and retrieval.
///
/// Passed to both components at construction; nothing is read from global
/// state after that.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Directory holding the vector store files.
    pub db_path: PathBuf,
    /// Name of the collection documents are stored in.
    pub collection_name: String,
    /// Flat directory of markdown documents to ingest.
    pub documents_dir: PathBuf,
    /// Embedding model name.
    pub embedding_model: String,
    /// Number of results retrieval returns.
    pub top_k: usize,
    /// Distance function for newly created collections.
    pub distance: DistanceMetric,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("db"),
            collection_name: "tax_docs".to_string(),
            documents_dir: PathBuf::from("internal_docs"),
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            top_k: 3,
            distance: DistanceMetric::SquaredL2,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// A builder starting from this configuration.
    pub fn into_builder(self) -> RagConfigBuilder {
        RagConfigBuilder { config: self }
    }

    /// Defaults overlaid with the `AGENTIC_RAG_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`, keyed by the `ENV_*` names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(path) = lookup(ENV_DB_PATH) {
            builder = builder.db_path(path);
        }
        if let Some(name) = lookup(ENV_COLLECTION) {
            builder = builder.collection_name(name);
        }
        if let Some(dir) = lookup(ENV_DOCS_DIR) {
            builder = builder.documents_dir(dir);
        }
        if let Some(model) = lookup(ENV_EMBEDDING_MODEL) {
            builder = builder.embedding_model(model);
        }
        if let Some(raw) = lookup(ENV_TOP_K) {
            let k = raw
                .trim()
                .parse()
                .map_err(|_| RagError::ConfigError(format!("{ENV_TOP_K} must be an integer, got '{raw}'")))?;
            builder = builder.top_k(k);
        }
        if let Some(raw) = lookup(ENV_DISTANCE) {
            builder = builder.distance(raw.parse()?);
        }
        builder.build()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the vector store directory.
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = path.into();
        self
    }

    /// Set the collection name.
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.collection_name = name.into();
        self
    }

    /// Set the documents directory.
    pub fn documents_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.documents_dir = dir.into();
        self
    }

    /// Set the embedding model name.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the number of results retrieval returns.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the distance function for new collections.
    pub fn distance(mut self, metric: DistanceMetric) -> Self {
        self.config.distance = metric;
        self
    }

    /// Build the [`RagConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `top_k == 0`
    /// - `collection_name` or `embedding_model` is blank
    pub fn build(self) -> Result<RagConfig> {
        if self.config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.config.collection_name.trim().is_empty() {
            return Err(RagError::ConfigError("collection_name must not be empty".to_string()));
        }
        if self.config.embedding_model.trim().is_empty() {
            return Err(RagError::ConfigError("embedding_model must not be empty".to_string()));
        }
        Ok(self.config)
    }
}
