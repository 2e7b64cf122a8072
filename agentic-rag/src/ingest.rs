//! Markdown ingestion: read → embed → upsert.
//!
//! [`ingest_directory`] loads every `*.md` file directly under a directory
//! into a [`Collection`], one document per file. Per-file failures are logged
//! and recorded in the [`IngestReport`]; only a missing or unreadable
//! directory fails the run.
//!
//! # Example
//!
//! ```rust,ignore
//! use agentic_rag::{IngestPipeline, LanceDbVectorStore, RagConfig};
//!
//! let pipeline = IngestPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(LanceDbVectorStore::open("db").await?))
//!     .build()?;
//!
//! let report = pipeline.run().await?;
//! println!("stored {} documents", report.stored_count());
//! ```

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::collection::Collection;
use crate::config::RagConfig;
use crate::document::{FILE_PATH_KEY, FILENAME_KEY, Metadata};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const MARKDOWN_SUFFIX: &str = ".md";

/// Why a file was left out of the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Content was empty or whitespace only.
    Empty,
    /// Content was not valid UTF-8.
    Decode,
    /// The file disappeared between listing and reading.
    Vanished,
    /// Any other read failure.
    Read,
    /// The embedder failed on this document.
    Embedding,
    /// The store rejected this document.
    Store,
}

/// A file that was not stored, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    /// The file name within the documents directory.
    pub filename: String,
    /// The skip category.
    pub reason: SkipReason,
    /// Human-readable detail.
    pub message: String,
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Ids of the stored documents, in processing order.
    pub stored: Vec<String>,
    /// Files that were skipped.
    pub skipped: Vec<SkippedFile>,
}

impl IngestReport {
    /// Number of documents successfully stored.
    pub fn stored_count(&self) -> usize {
        self.stored.len()
    }

    fn skip(&mut self, filename: &str, reason: SkipReason, message: impl Into<String>) {
        self.skipped.push(SkippedFile {
            filename: filename.to_string(),
            reason,
            message: message.into(),
        });
    }
}

/// Derive a document id from a file name: everything before the first `.`.
///
/// Names starting with a dot fall back to the name minus the markdown suffix.
pub fn document_id(filename: &str) -> String {
    match filename.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => filename.strip_suffix(MARKDOWN_SUFFIX).unwrap_or(filename).to_string(),
    }
}

/// List markdown file names directly under `dir`, sorted lexicographically.
///
/// # Errors
///
/// [`RagError::DirectoryNotFound`] if `dir` does not exist,
/// [`RagError::DirectoryUnreadable`] if it cannot be checked or listed.
pub async fn list_markdown_files(dir: &Path) -> Result<Vec<String>> {
    let unreadable = |source| RagError::DirectoryUnreadable { path: dir.to_path_buf(), source };
    if !tokio::fs::try_exists(dir).await.map_err(unreadable)? {
        return Err(RagError::DirectoryNotFound { path: dir.to_path_buf() });
    }

    let mut entries = tokio::fs::read_dir(dir).await.map_err(unreadable)?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !name.ends_with(MARKDOWN_SUFFIX) {
            continue;
        }
        if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Ingest every markdown file under `documents_dir` into `collection`.
///
/// Files are processed sequentially in lexicographic order, so when two
/// files map to the same id the later name wins. Each document is embedded
/// whole, without chunking.
///
/// # Errors
///
/// Only directory-level failures are returned; see [`list_markdown_files`].
pub async fn ingest_directory(
    documents_dir: &Path,
    collection: &Collection,
    embedder: &dyn EmbeddingProvider,
) -> Result<IngestReport> {
    let files = list_markdown_files(documents_dir)
        .await
        .inspect_err(|e| error!(error = %e, "ingestion aborted"))?;

    let mut report = IngestReport::default();
    if files.is_empty() {
        warn!(dir = %documents_dir.display(), "no markdown files found");
        return Ok(report);
    }
    info!(count = files.len(), dir = %documents_dir.display(), "found markdown files to process");

    let base = tokio::fs::canonicalize(documents_dir)
        .await
        .unwrap_or_else(|_| documents_dir.to_path_buf());

    for filename in &files {
        let path = base.join(filename);
        ingest_file(&path, filename, collection, embedder, &mut report).await;
    }

    info!(
        stored = report.stored_count(),
        skipped = report.skipped.len(),
        collection = collection.name(),
        "ingestion finished"
    );
    Ok(report)
}

async fn ingest_file(
    path: &Path,
    filename: &str,
    collection: &Collection,
    embedder: &dyn EmbeddingProvider,
    report: &mut IngestReport,
) {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            error!(file = %path.display(), "file not found");
            report.skip(filename, SkipReason::Vanished, e.to_string());
            return;
        }
        Err(e) => {
            error!(file = filename, error = %e, "error reading file");
            report.skip(filename, SkipReason::Read, e.to_string());
            return;
        }
    };
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            error!(file = filename, error = %e, "file is not valid UTF-8");
            report.skip(filename, SkipReason::Decode, e.to_string());
            return;
        }
    };
    if text.trim().is_empty() {
        warn!(file = filename, "skipping empty file");
        report.skip(filename, SkipReason::Empty, "content is empty");
        return;
    }

    info!(file = filename, "processing");
    let embedding = match embedder.embed(&text).await {
        Ok(embedding) => embedding,
        Err(e) => {
            error!(file = filename, error = %e, "embedding failed");
            report.skip(filename, SkipReason::Embedding, e.to_string());
            return;
        }
    };

    let id = document_id(filename);
    let metadata = Metadata::from([
        (FILENAME_KEY.to_string(), filename.to_string()),
        (FILE_PATH_KEY.to_string(), path.display().to_string()),
    ]);
    match collection.add(vec![text], vec![metadata], vec![id.clone()], Some(vec![embedding])).await {
        Ok(()) => {
            info!(file = filename, document.id = %id, "added document");
            report.stored.push(id);
        }
        Err(e) => {
            error!(file = filename, document.id = %id, error = %e, "store rejected document");
            report.skip(filename, SkipReason::Store, e.to_string());
        }
    }
}

/// Ingestion bound to a configuration, an embedder and a store.
///
/// Construct one via [`IngestPipeline::builder()`].
pub struct IngestPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
}

impl IngestPipeline {
    /// Create a new [`IngestPipelineBuilder`].
    pub fn builder() -> IngestPipelineBuilder {
        IngestPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Open the configured collection with get-or-create semantics.
    pub async fn collection(&self) -> Result<Collection> {
        Collection::open(
            Arc::clone(&self.vector_store),
            &self.config.collection_name,
            Arc::clone(&self.embedding_provider),
            self.config.distance,
        )
        .await
    }

    /// Ingest the configured documents directory.
    pub async fn run(&self) -> Result<IngestReport> {
        self.ingest_dir(&self.config.documents_dir).await
    }

    /// Ingest an explicit directory into the configured collection.
    pub async fn ingest_dir(&self, dir: &Path) -> Result<IngestReport> {
        let collection = self.collection().await?;
        ingest_directory(dir, &collection, self.embedding_provider.as_ref()).await
    }
}

/// Builder for constructing an [`IngestPipeline`]. All fields are required.
#[derive(Default)]
pub struct IngestPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
}

impl IngestPipelineBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Build the [`IngestPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any field is missing.
    pub fn build(self) -> Result<IngestPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        Ok(IngestPipeline { config, embedding_provider, vector_store })
    }
}
