//! Retrieval and tool behaviour end to end.

use std::fs;
use std::sync::Arc;

use agentic_rag::document::{Document, Neighbor};
use agentic_rag::retrieval::{ELLIPSIS, PREVIEW_CHARS, SEARCH_ERROR_PREFIX};
use agentic_rag::{
    Collection, CollectionInfo, CollectionOptions, DistanceMetric, DocumentSearchTool,
    HashEmbeddingProvider, InMemoryVectorStore, IngestPipeline, RagConfig, RagError, Retriever,
    Tool, VectorStore, retrieve,
};
use async_trait::async_trait;
use serde_json::json;

fn embedder() -> Arc<HashEmbeddingProvider> {
    Arc::new(HashEmbeddingProvider::new(512).unwrap())
}

async fn seeded_store(
    docs: &[(&str, &str)],
) -> (tempfile::TempDir, RagConfig, Arc<InMemoryVectorStore>) {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("internal_docs");
    fs::create_dir_all(&dir).unwrap();
    for (name, text) in docs {
        fs::write(dir.join(name), text).unwrap();
    }

    let config = RagConfig::builder()
        .db_path(temp.path().join("db"))
        .documents_dir(dir)
        .build()
        .unwrap();
    let store = Arc::new(InMemoryVectorStore::new());
    IngestPipeline::builder()
        .config(config.clone())
        .embedding_provider(embedder())
        .vector_store(store.clone())
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();
    (temp, config, store)
}

#[tokio::test]
async fn empty_collection_reports_no_results() {
    let store = Arc::new(InMemoryVectorStore::new());
    let collection =
        Collection::open(store, "tax_docs", embedder(), DistanceMetric::SquaredL2).await.unwrap();

    assert_eq!(
        retrieve("tax deadline", &collection, 3).await,
        "No relevant documents found for query: 'tax deadline'"
    );
}

#[tokio::test]
async fn tool_on_fresh_store_creates_collection_and_reports_no_results() {
    let store = Arc::new(InMemoryVectorStore::new());
    let tool = DocumentSearchTool::new(store.clone(), embedder(), &RagConfig::default());

    let out = tool.call(json!({ "query": "tax deadline" })).await;
    assert_eq!(out, "No relevant documents found for query: 'tax deadline'");
    assert_eq!(store.list_collections().await.unwrap(), vec!["tax_docs".to_string()]);
}

#[tokio::test]
async fn closest_document_ranks_first() {
    let (_temp, config, store) = seeded_store(&[
        ("deadlines.md", "The quarterly tax filing deadline is April 15."),
        ("expenses.md", "Coffee bean expenses grew in 2022."),
        ("staff.md", "Baristas are scheduled in weekly shifts."),
    ])
    .await;

    let retriever = Retriever::open(&config, store, embedder()).await.unwrap();
    let results = retriever.search("tax filing deadline").await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].id, "deadlines");
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));

    let report = retriever.report("tax filing deadline").await;
    assert!(report.starts_with("Document 1 (from deadlines.md, relevance: "));
    assert!(report.contains("\n\nDocument 2 (from "));
    assert!(report.contains("\n\nDocument 3 (from "));
}

#[tokio::test]
async fn k_limits_result_count() {
    let (_temp, config, store) =
        seeded_store(&[("a.md", "alpha"), ("b.md", "beta"), ("c.md", "gamma"), ("d.md", "delta")])
            .await;

    let retriever = Retriever::open(&config, store, embedder()).await.unwrap();
    assert_eq!(retriever.search("alpha").await.unwrap().len(), 3);
    assert_eq!(retriever.search_k("alpha", 1).await.unwrap().len(), 1);
    assert_eq!(retriever.search_k("alpha", 10).await.unwrap().len(), 4);
}

#[tokio::test]
async fn long_documents_are_previewed() {
    let long = format!("tax {}", "x".repeat(PREVIEW_CHARS * 2));
    let (_temp, config, store) = seeded_store(&[("long.md", long.as_str())]).await;

    let tool = DocumentSearchTool::new(store, embedder(), &config);
    let out = tool.call(json!({ "query": "tax" })).await;

    let body = out.lines().nth(1).unwrap();
    assert_eq!(body.chars().count(), PREVIEW_CHARS + ELLIPSIS.len());
    assert!(body.ends_with(ELLIPSIS));
    assert!(long.starts_with(body.trim_end_matches(ELLIPSIS)));
}

#[tokio::test]
async fn relevance_is_rendered_with_three_decimals() {
    let (_temp, config, store) = seeded_store(&[("a.md", "exact phrase")]).await;
    let tool = DocumentSearchTool::new(store, embedder(), &config);

    let out = tool.call(json!({ "query": "exact phrase" })).await;
    assert_eq!(out, "Document 1 (from a.md, relevance: 1.000):\nexact phrase\n");
}

#[tokio::test]
async fn dimension_mismatch_is_rendered_as_search_error() {
    let (_temp, config, store) = seeded_store(&[("a.md", "alpha")]).await;
    let other = Arc::new(HashEmbeddingProvider::new(8).unwrap());
    let tool = DocumentSearchTool::new(store, other, &config);

    let out = tool.call(json!({ "query": "alpha" })).await;
    assert!(out.starts_with(SEARCH_ERROR_PREFIX), "{out}");
    assert!(out.contains("expects 512"));
}

/// A store whose reads always fail.
struct UnavailableStore;

#[async_trait]
impl VectorStore for UnavailableStore {
    async fn get_or_create_collection(
        &self,
        name: &str,
        options: &CollectionOptions,
    ) -> agentic_rag::Result<CollectionInfo> {
        Ok(CollectionInfo {
            name: name.to_string(),
            metric: options.metric,
            embedding_model: options.embedding_model.clone(),
            dimensions: None,
        })
    }

    async fn upsert(&self, _collection: &str, _documents: &[Document]) -> agentic_rag::Result<()> {
        Ok(())
    }

    async fn query(
        &self,
        _collection: &str,
        _embedding: &[f32],
        _top_k: usize,
    ) -> agentic_rag::Result<Vec<Neighbor>> {
        Err(RagError::VectorStoreError {
            backend: "unavailable".into(),
            message: "connection refused".into(),
        })
    }

    async fn get(&self, _collection: &str, _ids: &[&str]) -> agentic_rag::Result<Vec<Document>> {
        Ok(Vec::new())
    }

    async fn count(&self, _collection: &str) -> agentic_rag::Result<usize> {
        Ok(0)
    }

    async fn list_collections(&self) -> agentic_rag::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn store_failure_is_rendered_as_search_error() {
    let tool =
        DocumentSearchTool::new(Arc::new(UnavailableStore), embedder(), &RagConfig::default());
    let out = tool.call(json!({ "query": "tax deadline" })).await;

    assert_eq!(
        out,
        "Error searching ChromaDB: Vector store error (unavailable): connection refused"
    );
}
