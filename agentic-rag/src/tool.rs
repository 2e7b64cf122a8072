//! Retrieval exposed as an agent tool.
//!
//! Orchestrators call tools with JSON arguments and expect plain text back,
//! with no separate error channel. [`DocumentSearchTool`] therefore always
//! answers with a string: the rendered report, or an error message.
//!
//! # Example
//!
//! ```rust,ignore
//! use agentic_rag::{DocumentSearchTool, Tool};
//!
//! let tool = DocumentSearchTool::new(store, embedder, &config);
//! let answer = tool.call(json!({ "query": "quarterly filing deadline" })).await;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::collection::Collection;
use crate::config::RagConfig;
use crate::embedding::EmbeddingProvider;
use crate::retrieval::{SEARCH_ERROR_PREFIX, retrieve};
use crate::vectorstore::{DistanceMetric, VectorStore};

/// Name under which the search tool is registered with orchestrators.
pub const TOOL_NAME: &str = "ChromaDBTool";

/// A capability an external orchestrator can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registered tool name.
    fn name(&self) -> &str;

    /// What the tool does, shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Option<Value>;

    /// Run the tool. Failures are described in the returned text.
    async fn call(&self, args: Value) -> String;
}

/// Searches the internal documents collection.
///
/// Every call re-opens the collection with get-or-create semantics, so the
/// tool works before anything has been ingested and picks up documents
/// ingested by other runs against the same store.
pub struct DocumentSearchTool {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    collection_name: String,
    metric: DistanceMetric,
    top_k: usize,
}

impl DocumentSearchTool {
    /// Create the tool for the collection and `top_k` in `config`.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &RagConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            collection_name: config.collection_name.clone(),
            metric: config.distance,
            top_k: config.top_k,
        }
    }

    /// Search for `query` and render the report.
    pub async fn run(&self, query: &str) -> String {
        info!(query, collection = %self.collection_name, "document search called");
        let collection = match Collection::open(
            Arc::clone(&self.store),
            &self.collection_name,
            Arc::clone(&self.embedder),
            self.metric,
        )
        .await
        {
            Ok(collection) => collection,
            Err(e) => return format!("{SEARCH_ERROR_PREFIX}{e}"),
        };
        retrieve(query, &collection, self.top_k).await
    }
}

#[async_trait]
impl Tool for DocumentSearchTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "A tool to search the internal document database for relevant information"
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query, not the full question."
                }
            },
            "required": ["query"]
        }))
    }

    async fn call(&self, args: Value) -> String {
        let query = match &args {
            Value::String(query) => query.as_str(),
            _ => match args.get("query").and_then(Value::as_str) {
                Some(query) => query,
                None => {
                    warn!(%args, "document search called without a query");
                    return format!("{SEARCH_ERROR_PREFIX}missing required 'query' string argument");
                }
            },
        };
        self.run(query).await
    }
}
