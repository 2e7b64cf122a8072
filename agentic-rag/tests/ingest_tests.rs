//! Ingestion of temporary document directories into an in-memory store.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use agentic_rag::document::{FILE_PATH_KEY, FILENAME_KEY};
use agentic_rag::{
    Collection, DistanceMetric, EmbeddingProvider, HashEmbeddingProvider, InMemoryVectorStore,
    IngestPipeline, RagConfig, RagError, SkipReason, VectorStore, ingest_directory,
};
use async_trait::async_trait;

const DIMS: usize = 32;

async fn open_collection() -> (Arc<InMemoryVectorStore>, Collection) {
    reopen_collection(Arc::new(InMemoryVectorStore::new())).await
}

async fn reopen_collection(
    store: Arc<InMemoryVectorStore>,
) -> (Arc<InMemoryVectorStore>, Collection) {
    let embedder = Arc::new(HashEmbeddingProvider::new(DIMS).unwrap());
    let collection = Collection::open(store.clone(), "tax_docs", embedder, DistanceMetric::SquaredL2)
        .await
        .unwrap();
    (store, collection)
}

fn embedder() -> HashEmbeddingProvider {
    HashEmbeddingProvider::new(DIMS).unwrap()
}

#[tokio::test]
async fn empty_files_are_skipped() {
    let temp = tempfile::tempdir().unwrap();
    let docs = temp.path().join("internal_docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("a.md"), "Hello").unwrap();
    fs::write(docs.join("b.md"), "").unwrap();

    let (_, collection) = open_collection().await;
    let report = ingest_directory(&docs, &collection, &embedder()).await.unwrap();

    assert_eq!(report.stored_count(), 1);
    assert_eq!(report.stored, vec!["a".to_string()]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::Empty);
    assert_eq!(collection.count().await.unwrap(), 1);
    assert!(collection.get(&["b"]).await.unwrap().is_empty());
}

#[tokio::test]
async fn whitespace_only_document_is_never_stored() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("blank.md"), " \n\t \n").unwrap();

    let (_, collection) = open_collection().await;
    let report = ingest_directory(temp.path(), &collection, &embedder()).await.unwrap();

    assert_eq!(report.stored_count(), 0);
    assert_eq!(collection.count().await.unwrap(), 0);
}

#[tokio::test]
async fn stored_documents_carry_filename_and_absolute_path() {
    let temp = tempfile::tempdir().unwrap();
    let docs = temp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("deadlines.md"), "# Deadlines\nFile by April 15.").unwrap();

    let (_, collection) = open_collection().await;
    ingest_directory(&docs, &collection, &embedder()).await.unwrap();

    let stored = collection.get(&["deadlines"]).await.unwrap();
    assert_eq!(stored.len(), 1);
    let document = &stored[0];
    assert_eq!(document.text, "# Deadlines\nFile by April 15.");
    assert_eq!(document.metadata[FILENAME_KEY], "deadlines.md");
    let path = Path::new(&document.metadata[FILE_PATH_KEY]);
    assert!(path.is_absolute());
    assert!(path.ends_with("docs/deadlines.md"));
    assert_eq!(document.embedding, embedder().embed(&document.text).await.unwrap());
}

#[tokio::test]
async fn reingestion_is_idempotent_and_keeps_latest_content() {
    let temp = tempfile::tempdir().unwrap();
    let docs = temp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("a.md"), "first version").unwrap();
    fs::write(docs.join("b.md"), "other").unwrap();

    let (store, collection) = open_collection().await;
    ingest_directory(&docs, &collection, &embedder()).await.unwrap();
    ingest_directory(&docs, &collection, &embedder()).await.unwrap();
    assert_eq!(collection.count().await.unwrap(), 2);

    fs::write(docs.join("a.md"), "second version").unwrap();
    let (_, collection) = reopen_collection(store).await;
    let report = ingest_directory(&docs, &collection, &embedder()).await.unwrap();

    assert_eq!(report.stored_count(), 2);
    assert_eq!(collection.count().await.unwrap(), 2);
    let a = collection.get(&["a"]).await.unwrap();
    assert_eq!(a[0].text, "second version");
}

#[tokio::test]
async fn id_collisions_resolve_to_last_name_in_sorted_order() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("report.2023.md"), "twenty twenty three").unwrap();
    fs::write(temp.path().join("report.md"), "undated").unwrap();

    let (_, collection) = open_collection().await;
    let report = ingest_directory(temp.path(), &collection, &embedder()).await.unwrap();

    assert_eq!(report.stored, vec!["report".to_string(), "report".to_string()]);
    let stored = collection.get(&["report"]).await.unwrap();
    assert_eq!(stored[0].text, "undated");
}

#[tokio::test]
async fn directory_without_markdown_is_a_noop_success() {
    let temp = tempfile::tempdir().unwrap();
    let docs = temp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("notes.txt"), "not markdown").unwrap();

    let (store, collection) = open_collection().await;
    let report = ingest_directory(&docs, &collection, &embedder()).await.unwrap();

    assert_eq!(report.stored_count(), 0);
    assert!(report.skipped.is_empty());
    assert_eq!(store.count("tax_docs").await.unwrap(), 0);
}

#[tokio::test]
async fn missing_directory_fails_the_run() {
    let temp = tempfile::tempdir().unwrap();
    let (_, collection) = open_collection().await;

    let err = ingest_directory(&temp.path().join("absent"), &collection, &embedder())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::DirectoryNotFound { .. }));
    assert!(err.to_string().starts_with("Documents directory not found"));
}

#[tokio::test]
async fn invalid_utf8_is_skipped_and_the_rest_continue() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("a.md"), [0xff, 0xfe, 0x00, 0x41]).unwrap();
    fs::write(temp.path().join("b.md"), "valid").unwrap();

    let (_, collection) = open_collection().await;
    let report = ingest_directory(temp.path(), &collection, &embedder()).await.unwrap();

    assert_eq!(report.stored, vec!["b".to_string()]);
    assert_eq!(report.skipped[0].filename, "a.md");
    assert_eq!(report.skipped[0].reason, SkipReason::Decode);
}

/// Embeds normally except for texts containing a poison word.
struct FlakyEmbedder {
    inner: HashEmbeddingProvider,
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> agentic_rag::Result<Vec<f32>> {
        if text.contains("poison") {
            return Err(RagError::EmbeddingError {
                provider: "flaky".into(),
                message: "refused".into(),
            });
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Always returns a vector of the wrong length.
struct ShortEmbedder;

#[async_trait]
impl EmbeddingProvider for ShortEmbedder {
    async fn embed(&self, _text: &str) -> agentic_rag::Result<Vec<f32>> {
        Ok(vec![1.0; 3])
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "short"
    }
}

#[tokio::test]
async fn per_document_failures_do_not_abort_the_run() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("a.md"), "healthy document").unwrap();
    fs::write(temp.path().join("b.md"), "poison pill").unwrap();
    fs::write(temp.path().join("c.md"), "another healthy one").unwrap();

    let (_, collection) = open_collection().await;
    let flaky = FlakyEmbedder { inner: embedder() };
    let report = ingest_directory(temp.path(), &collection, &flaky).await.unwrap();

    assert_eq!(report.stored, vec!["a".to_string(), "c".to_string()]);
    assert_eq!(report.skipped[0].reason, SkipReason::Embedding);

    let report = ingest_directory(temp.path(), &collection, &ShortEmbedder).await.unwrap();
    assert_eq!(report.stored_count(), 0);
    assert!(report.skipped.iter().all(|s| s.reason == SkipReason::Store));
    assert_eq!(collection.count().await.unwrap(), 2);
}

#[tokio::test]
async fn pipeline_runs_against_configured_directory() {
    let temp = tempfile::tempdir().unwrap();
    let docs = temp.path().join("internal_docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("expenses.md"), "Total expenses peaked in 2022.").unwrap();

    let config = RagConfig::builder()
        .db_path(temp.path().join("db"))
        .documents_dir(&docs)
        .collection_name("handbook")
        .build()
        .unwrap();
    let store = Arc::new(InMemoryVectorStore::new());
    let pipeline = IngestPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(embedder()))
        .vector_store(store.clone())
        .build()
        .unwrap();

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.stored_count(), 1);
    assert_eq!(store.count("handbook").await.unwrap(), 1);
    assert_eq!(store.list_collections().await.unwrap(), vec!["handbook".to_string()]);
}
