//! In-memory vector store.
//!
//! [`InMemoryVectorStore`] keeps every collection in a `HashMap` behind a
//! `tokio::sync::RwLock`. Nothing is persisted; it backs tests and
//! throwaway sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Document, Neighbor};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionData, CollectionInfo, CollectionOptions, VectorStore};

const BACKEND: &str = "InMemory";

/// A non-persistent [`VectorStore`].
///
/// # Example
///
/// ```rust,ignore
/// use agentic_rag::{CollectionOptions, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.get_or_create_collection("docs", &CollectionOptions::default()).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, CollectionData>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(collection: &str) -> RagError {
    RagError::store(BACKEND, format!("collection '{collection}' does not exist"))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn get_or_create_collection(
        &self,
        name: &str,
        options: &CollectionOptions,
    ) -> Result<CollectionInfo> {
        let mut collections = self.collections.write().await;
        let data =
            collections.entry(name.to_string()).or_insert_with(|| CollectionData::new(name, options));
        Ok(data.info.clone())
    }

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let data = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        data.upsert(documents, BACKEND)
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Neighbor>> {
        let collections = self.collections.read().await;
        let data = collections.get(collection).ok_or_else(|| missing(collection))?;
        data.nearest(embedding, top_k, BACKEND)
    }

    async fn get(&self, collection: &str, ids: &[&str]) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let data = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(ids.iter().filter_map(|id| data.documents.get(*id).cloned()).collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).ok_or_else(|| missing(collection))?.documents.len())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
