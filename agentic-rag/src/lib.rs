//! Markdown document ingestion and retrieval for agent tools.
//!
//! This crate provides:
//! - Whole-document ingestion of a flat directory of markdown files
//! - Get-or-create vector collections, persisted in LanceDB
//! - Nearest-neighbour retrieval rendered as a ranked text report
//! - A string-in/string-out search tool for external agent orchestrators
//!
//! Embedders: [`HashEmbeddingProvider`] always; `FastEmbedProvider` with the
//! `fastembed` feature; `OpenAIEmbeddingProvider` with the `openai` feature.
//! Stores: [`InMemoryVectorStore`] always; `LanceDbVectorStore` with the
//! `lancedb` feature.

pub mod collection;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod inmemory;
pub mod retrieval;
pub mod tool;
pub mod vectorstore;

#[cfg(feature = "fastembed")]
pub mod fastembed;
#[cfg(feature = "lancedb")]
pub mod lancedb;
#[cfg(feature = "openai")]
pub mod openai;

pub use collection::Collection;
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Document, Metadata, Neighbor, QueryResponse};
pub use embedding::{EmbeddingProvider, HashEmbeddingProvider};
pub use error::{RagError, Result};
pub use ingest::{
    IngestPipeline, IngestPipelineBuilder, IngestReport, SkipReason, SkippedFile, document_id,
    ingest_directory, list_markdown_files,
};
pub use inmemory::InMemoryVectorStore;
pub use retrieval::{Retriever, format_compact, format_report, retrieve};
pub use tool::{DocumentSearchTool, TOOL_NAME, Tool};
pub use vectorstore::{CollectionInfo, CollectionOptions, DistanceMetric, VectorStore};

#[cfg(feature = "fastembed")]
pub use self::fastembed::FastEmbedProvider;
#[cfg(feature = "lancedb")]
pub use self::lancedb::LanceDbVectorStore;
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
