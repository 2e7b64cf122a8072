//! Error types for the `agentic-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in ingestion and retrieval.
#[derive(Debug, Error)]
pub enum RagError {
    /// The documents directory does not exist.
    #[error("Documents directory not found: {}", path.display())]
    DirectoryNotFound {
        /// The directory that was looked up.
        path: PathBuf,
    },

    /// The documents directory exists but could not be listed.
    #[error("Error reading directory {}: {source}", path.display())]
    DirectoryUnreadable {
        /// The directory that failed to list.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the ingestion or retrieval orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// A filesystem error outside directory enumeration.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A collection file could not be encoded or decoded.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    pub(crate) fn store(backend: &str, message: impl Into<String>) -> Self {
        Self::VectorStoreError { backend: backend.to_string(), message: message.into() }
    }

    #[cfg(any(feature = "fastembed", feature = "openai"))]
    pub(crate) fn embedding(provider: &str, message: impl Into<String>) -> Self {
        Self::EmbeddingError { provider: provider.to_string(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
