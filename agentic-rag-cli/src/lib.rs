//! Command-line front end for `agentic-rag`.
//!
//! ```text
//! agentic-rag ingest [--docs DIR]
//! agentic-rag search <QUERY> [-k N] [--compact]
//! agentic-rag tool <JSON_ARGS>
//! ```
//!
//! Defaults come from [`RagConfig::from_env`]; flags override them.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use agentic_rag::{
    DocumentSearchTool, EmbeddingProvider, HashEmbeddingProvider, IngestPipeline,
    LanceDbVectorStore, RagConfig, Retriever, Tool, format_compact, retrieve,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::{error, info, warn};

/// Dimensions of the hashing embedder, matching `all-MiniLM-L6-v2`.
pub const DEFAULT_HASH_DIMENSIONS: usize = 384;

#[derive(Debug, Parser)]
#[command(name = "agentic-rag", version, about = "Ingest markdown documents and search them")]
pub struct Cli {
    /// LanceDB directory
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Collection name
    #[arg(long, global = true)]
    pub collection: Option<String>,

    /// Embedding backend
    #[arg(long, global = true, value_enum, default_value_t = EmbedderKind::Fastembed)]
    pub embedder: EmbedderKind,

    /// Embedding model name for the fastembed and openai backends; rejected with `hash`
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Vector size of the hash embedder
    #[arg(long, global = true, default_value_t = DEFAULT_HASH_DIMENSIONS)]
    pub hash_dimensions: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Embed every markdown file of a directory into the collection
    Ingest {
        /// Documents directory
        #[arg(long)]
        docs: Option<PathBuf>,
    },
    /// Print the documents closest to a query
    Search {
        query: String,

        /// Number of results
        #[arg(short, long)]
        k: Option<usize>,

        /// One line per result, shorter previews
        #[arg(long)]
        compact: bool,
    },
    /// Call the search tool with raw JSON arguments, as an orchestrator would
    Tool {
        /// `{"query": "..."}` or a JSON string; anything else is sent as the query
        json_args: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Local sentence-embedding model, compiled in by default
    Fastembed,
    /// Feature hashing, no model download; vectors carry no semantics
    Hash,
    /// OpenAI embeddings API (needs the `openai` feature and `OPENAI_API_KEY`)
    Openai,
}

impl Cli {
    /// Overlay the command-line flags on `base`.
    pub fn apply(&self, base: RagConfig) -> Result<RagConfig> {
        if self.embedder == EmbedderKind::Hash && self.model.is_some() {
            anyhow::bail!("--model has no effect with --embedder hash; drop one of them");
        }
        let mut builder = base.into_builder();
        if let Some(db) = &self.db {
            builder = builder.db_path(db);
        }
        if let Some(collection) = &self.collection {
            builder = builder.collection_name(collection);
        }
        if let Some(model) = &self.model {
            builder = builder.embedding_model(model);
        }
        if let Command::Ingest { docs: Some(docs) } = &self.command {
            builder = builder.documents_dir(docs);
        }
        if let Command::Search { k: Some(k), .. } = &self.command {
            builder = builder.top_k(*k);
        }
        Ok(builder.build()?)
    }

    /// Construct the selected embedder.
    pub fn embedder(&self, config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        match self.embedder {
            EmbedderKind::Hash => Ok(Arc::new(HashEmbeddingProvider::new(self.hash_dimensions)?)),
            EmbedderKind::Fastembed => fastembed_embedder(config),
            EmbedderKind::Openai => openai_embedder(self.model.as_deref()),
        }
    }
}

#[cfg(feature = "fastembed")]
fn fastembed_embedder(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::new(agentic_rag::FastEmbedProvider::from_name(&config.embedding_model)?))
}

#[cfg(not(feature = "fastembed"))]
fn fastembed_embedder(_config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    anyhow::bail!("the fastembed embedder is not compiled in; rebuild with `--features fastembed`")
}

// The configured default model names a local model, so only an explicit
// `--model` is forwarded to the API.
#[cfg(feature = "openai")]
fn openai_embedder(model: Option<&str>) -> Result<Arc<dyn EmbeddingProvider>> {
    let mut provider = agentic_rag::OpenAIEmbeddingProvider::from_env()?;
    if let Some(model) = model {
        provider = provider.with_model(model);
    }
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "openai"))]
fn openai_embedder(_model: Option<&str>) -> Result<Arc<dyn EmbeddingProvider>> {
    anyhow::bail!("the openai embedder is not compiled in; rebuild with `--features openai`")
}

/// Run `cli` against `config`, writing results to `out`.
///
/// Returns `Ok(false)` when ingestion could not run; the binary maps that to
/// exit status 1.
pub async fn execute(cli: &Cli, config: &RagConfig, out: &mut impl Write) -> Result<bool> {
    let embedder = cli.embedder(config)?;
    let store = Arc::new(
        LanceDbVectorStore::open(&config.db_path)
            .await
            .with_context(|| format!("failed to open vector store at {}", config.db_path.display()))?,
    );

    match &cli.command {
        Command::Ingest { .. } => {
            let pipeline = IngestPipeline::builder()
                .config(config.clone())
                .embedding_provider(embedder)
                .vector_store(store)
                .build()?;
            match pipeline.run().await {
                Ok(report) => {
                    for skipped in &report.skipped {
                        writeln!(
                            out,
                            "skipped {} ({:?}): {}",
                            skipped.filename, skipped.reason, skipped.message
                        )?;
                    }
                    writeln!(
                        out,
                        "Successfully loaded {} documents into collection '{}'",
                        report.stored_count(),
                        config.collection_name
                    )?;
                    Ok(true)
                }
                Err(e) => {
                    error!(error = %e, dir = %config.documents_dir.display(), "ingestion failed");
                    writeln!(out, "{e}")?;
                    Ok(false)
                }
            }
        }
        Command::Search { query, compact, .. } => {
            let retriever = Retriever::open(config, store, embedder).await?;
            if *compact {
                let results = retriever.search(query).await?;
                writeln!(out, "{}", format_compact(&results))?;
            } else {
                writeln!(out, "{}", retrieve(query, retriever.collection(), retriever.top_k()).await)?;
            }
            Ok(true)
        }
        Command::Tool { json_args } => {
            let args = serde_json::from_str::<Value>(json_args).unwrap_or_else(|_| {
                warn!("tool arguments are not JSON, sending them as the query");
                Value::String(json_args.clone())
            });
            let tool = DocumentSearchTool::new(store, embedder, config);
            info!(tool = tool.name(), "calling tool");
            writeln!(out, "{}", tool.call(args).await)?;
            Ok(true)
        }
    }
}
