//! Collection handle binding a store, a collection name and an embedder.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::document::{Document, Metadata, QueryResponse};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionInfo, CollectionOptions, DistanceMetric, VectorStore};

/// A named collection opened with get-or-create semantics.
///
/// The handle's embedder turns query texts into vectors and fills in
/// embeddings that [`add`](Collection::add) callers leave out. The embedder
/// is not required to match the one the collection was built with; a
/// different model name is logged, a different length is rejected by the store.
#[derive(Clone)]
pub struct Collection {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    info: CollectionInfo,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("info", &self.info)
            .field("embedder", &self.embedder.model_name())
            .finish_non_exhaustive()
    }
}

impl Collection {
    /// Get or create the collection `name`.
    pub async fn open(
        store: Arc<dyn VectorStore>,
        name: &str,
        embedder: Arc<dyn EmbeddingProvider>,
        metric: DistanceMetric,
    ) -> Result<Self> {
        let options =
            CollectionOptions { metric, embedding_model: Some(embedder.model_name().to_string()) };
        let info = store.get_or_create_collection(name, &options).await?;

        if let Some(recorded) = info.embedding_model.as_deref() {
            if recorded != embedder.model_name() {
                warn!(
                    collection = name,
                    recorded,
                    current = embedder.model_name(),
                    "collection was built with a different embedding model; distances may be meaningless"
                );
            }
        }

        Ok(Self { store, embedder, info })
    }

    /// The collection name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// The collection info as of opening.
    pub fn info(&self) -> &CollectionInfo {
        &self.info
    }

    /// The embedder bound to this handle.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Upsert documents given as parallel lists.
    ///
    /// When `embeddings` is `None` the documents are embedded with the
    /// handle's embedder.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the lists differ in length,
    /// or the embedding/store error.
    pub async fn add(
        &self,
        documents: Vec<String>,
        metadatas: Vec<Metadata>,
        ids: Vec<String>,
        embeddings: Option<Vec<Vec<f32>>>,
    ) -> Result<()> {
        let len = ids.len();
        let embeddings_len = embeddings.as_ref().map_or(len, Vec::len);
        if documents.len() != len || metadatas.len() != len || embeddings_len != len {
            return Err(RagError::PipelineError(format!(
                "add expects equal-length lists: {len} ids, {} documents, {} metadatas, {embeddings_len} embeddings",
                documents.len(),
                metadatas.len(),
            )));
        }
        if len == 0 {
            return Ok(());
        }

        let embeddings = match embeddings {
            Some(embeddings) => embeddings,
            None => {
                let texts: Vec<&str> = documents.iter().map(String::as_str).collect();
                self.embedder.embed_batch(&texts).await?
            }
        };

        let records: Vec<Document> = ids
            .into_iter()
            .zip(documents)
            .zip(metadatas)
            .zip(embeddings)
            .map(|(((id, text), metadata), embedding)| Document { id, text, metadata, embedding })
            .collect();

        self.store.upsert(self.name(), &records).await?;
        debug!(collection = self.name(), count = records.len(), "upserted documents");
        Ok(())
    }

    /// Run one nearest-neighbour query per text, `n_results` each.
    pub async fn query(&self, query_texts: &[&str], n_results: usize) -> Result<QueryResponse> {
        let mut response = QueryResponse::default();
        for text in query_texts {
            let embedding = self.embedder.embed(text).await?;
            let neighbors = self.store.query(self.name(), &embedding, n_results).await?;
            response.push_batch(neighbors);
        }
        Ok(response)
    }

    /// Fetch stored documents by id.
    pub async fn get(&self, ids: &[&str]) -> Result<Vec<Document>> {
        self.store.get(self.name(), ids).await
    }

    /// Number of stored documents.
    pub async fn count(&self) -> Result<usize> {
        self.store.count(self.name()).await
    }
}
