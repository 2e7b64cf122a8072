//! Vector store trait and the collection data shared by its backends.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Document, Neighbor};
use crate::error::{RagError, Result};

/// Distance function used to rank documents against a query embedding.
///
/// Lower distance means closer. Relevance is displayed as `1 - distance`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance.
    #[default]
    SquaredL2,
    /// `1 - cosine_similarity`; `1.0` when either vector has zero magnitude.
    Cosine,
    /// `1 - dot_product`.
    InnerProduct,
}

impl DistanceMetric {
    /// Compute the distance between two vectors of equal length.
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::SquaredL2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a * norm_b)
            }
            Self::InnerProduct => 1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        }
    }
}

impl DistanceMetric {
    /// The serialized name, accepted back by [`FromStr`](std::str::FromStr).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SquaredL2 => "squared_l2",
            Self::Cosine => "cosine",
            Self::InnerProduct => "inner_product",
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "l2" | "squared_l2" => Ok(Self::SquaredL2),
            "cosine" => Ok(Self::Cosine),
            "ip" | "inner_product" => Ok(Self::InnerProduct),
            other => Err(RagError::ConfigError(format!("unknown distance metric '{other}'"))),
        }
    }
}

/// Options applied when a collection is first created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionOptions {
    /// Distance function for queries.
    pub metric: DistanceMetric,
    /// Name of the embedding model that will write to the collection.
    pub embedding_model: Option<String>,
}

/// Descriptive state of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Distance function fixed at creation.
    pub metric: DistanceMetric,
    /// Embedding model recorded at creation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    /// Embedding length, fixed by the first upsert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

impl CollectionInfo {
    /// Check every embedding against the collection's dimensionality.
    ///
    /// An empty collection adopts the length of the first embedding.
    pub fn check_dimensions(&self, documents: &[Document], backend: &str) -> Result<usize> {
        let expected = match (self.dimensions, documents.first()) {
            (Some(dims), _) => dims,
            (None, Some(first)) => first.embedding.len(),
            (None, None) => return Ok(0),
        };
        if expected == 0 {
            return Err(RagError::store(backend, "embeddings must not be empty"));
        }
        if let Some(bad) = documents.iter().find(|d| d.embedding.len() != expected) {
            return Err(RagError::store(
                backend,
                format!(
                    "document '{}' has {} dimensions, collection '{}' expects {expected}",
                    bad.id,
                    bad.embedding.len(),
                    self.name
                ),
            ));
        }
        Ok(expected)
    }

    /// Reject a query embedding whose length differs from the stored ones.
    pub fn check_query(&self, embedding: &[f32], backend: &str) -> Result<()> {
        match self.dimensions {
            Some(dims) if embedding.len() != dims => Err(RagError::store(
                backend,
                format!(
                    "query embedding has {} dimensions, collection '{}' expects {dims}",
                    embedding.len(),
                    self.name
                ),
            )),
            _ => Ok(()),
        }
    }
}

/// A collection's metadata plus its documents keyed by id.
///
/// The in-memory backend keeps one of these per collection.
#[derive(Debug, Clone)]
pub struct CollectionData {
    pub info: CollectionInfo,
    pub documents: BTreeMap<String, Document>,
}

impl CollectionData {
    pub fn new(name: &str, options: &CollectionOptions) -> Self {
        Self {
            info: CollectionInfo {
                name: name.to_string(),
                metric: options.metric,
                embedding_model: options.embedding_model.clone(),
                dimensions: None,
            },
            documents: BTreeMap::new(),
        }
    }

    /// Insert or overwrite documents by id. Validates all before writing any.
    pub fn upsert(&mut self, documents: &[Document], backend: &str) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let dims = self.info.check_dimensions(documents, backend)?;
        self.info.dimensions = Some(dims);
        for document in documents {
            self.documents.insert(document.id.clone(), document.clone());
        }
        Ok(())
    }

    /// Return the `top_k` documents closest to `embedding`, ascending by
    /// distance with ties broken by id.
    pub fn nearest(&self, embedding: &[f32], top_k: usize, backend: &str) -> Result<Vec<Neighbor>> {
        if self.documents.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        self.info.check_query(embedding, backend)?;

        let metric = self.info.metric;
        let mut scored: Vec<(f32, &Document)> =
            self.documents.values().map(|d| (metric.distance(&d.embedding, embedding), d)).collect();
        scored.sort_by(|a, b| match a.0.total_cmp(&b.0) {
            Ordering::Equal => a.1.id.cmp(&b.1.id),
            other => other,
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(distance, d)| Neighbor {
                id: d.id.clone(),
                text: d.text.clone(),
                metadata: d.metadata.clone(),
                distance,
            })
            .collect())
    }
}

/// A storage backend for named collections of embedded documents.
///
/// Collections are created on demand ("get or create") and queried by
/// nearest-neighbour search over their embeddings.
///
/// # Example
///
/// ```rust,ignore
/// use agentic_rag::{CollectionOptions, LanceDbVectorStore, VectorStore};
///
/// let store = LanceDbVectorStore::open("db").await?;
/// store.get_or_create_collection("tax_docs", &CollectionOptions::default()).await?;
/// store.upsert("tax_docs", &documents).await?;
/// let nearest = store.query("tax_docs", &query_embedding, 3).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return the named collection, creating it with `options` if absent.
    ///
    /// Options are ignored for a collection that already exists.
    async fn get_or_create_collection(
        &self,
        name: &str,
        options: &CollectionOptions,
    ) -> Result<CollectionInfo>;

    /// Insert or overwrite documents by id.
    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<()>;

    /// Return the `top_k` documents nearest to `embedding`, ascending by distance.
    async fn query(&self, collection: &str, embedding: &[f32], top_k: usize)
    -> Result<Vec<Neighbor>>;

    /// Fetch documents by id. Unknown ids are skipped.
    async fn get(&self, collection: &str, ids: &[&str]) -> Result<Vec<Document>>;

    /// Number of documents in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Names of all collections, sorted.
    async fn list_collections(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;

    fn doc(id: &str, embedding: Vec<f32>) -> Document {
        Document { id: id.into(), text: id.into(), metadata: Metadata::new(), embedding }
    }

    #[test]
    fn squared_l2_of_identical_vectors_is_zero() {
        assert_eq!(DistanceMetric::SquaredL2.distance(&[0.5, 0.5], &[0.5, 0.5]), 0.0);
        assert_eq!(DistanceMetric::SquaredL2.distance(&[1.0, 0.0], &[0.0, 1.0]), 2.0);
    }

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(DistanceMetric::Cosine.distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert!(DistanceMetric::Cosine.distance(&[2.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
    }

    #[test]
    fn metric_parses_common_spellings() {
        assert_eq!("l2".parse::<DistanceMetric>().unwrap(), DistanceMetric::SquaredL2);
        assert_eq!("Cosine".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!("ip".parse::<DistanceMetric>().unwrap(), DistanceMetric::InnerProduct);
        assert!("manhattan".parse::<DistanceMetric>().is_err());
        for metric in [DistanceMetric::SquaredL2, DistanceMetric::Cosine, DistanceMetric::InnerProduct] {
            assert_eq!(metric.as_str().parse::<DistanceMetric>().unwrap(), metric);
        }
    }

    #[test]
    fn first_upsert_fixes_dimensions() {
        let mut data = CollectionData::new("c", &CollectionOptions::default());
        data.upsert(&[doc("a", vec![1.0, 0.0])], "test").unwrap();
        assert_eq!(data.info.dimensions, Some(2));

        let err = data.upsert(&[doc("b", vec![1.0, 0.0, 0.0])], "test").unwrap_err();
        assert!(err.to_string().contains("expects 2"));
        assert_eq!(data.documents.len(), 1);
    }

    #[test]
    fn nearest_orders_by_distance_then_id() {
        let mut data = CollectionData::new("c", &CollectionOptions::default());
        data.upsert(
            &[doc("far", vec![0.0, 1.0]), doc("b", vec![1.0, 0.0]), doc("a", vec![1.0, 0.0])],
            "test",
        )
        .unwrap();

        let ids: Vec<String> =
            data.nearest(&[1.0, 0.0], 3, "test").unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "b", "far"]);
    }

    #[test]
    fn nearest_rejects_mismatched_query() {
        let mut data = CollectionData::new("c", &CollectionOptions::default());
        data.upsert(&[doc("a", vec![1.0, 0.0])], "test").unwrap();
        assert!(data.nearest(&[1.0], 1, "test").is_err());
    }
}
