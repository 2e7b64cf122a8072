//! Data types for stored documents and query results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Key-value metadata attached to a stored document.
pub type Metadata = HashMap<String, String>;

/// Metadata key holding the original filename.
pub const FILENAME_KEY: &str = "filename";

/// Metadata key holding the absolute source path.
pub const FILE_PATH_KEY: &str = "file_path";

/// A unit of ingested knowledge: text, metadata, and the embedding computed
/// from the text at ingestion time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier within a collection.
    pub id: String,
    /// The full raw text content.
    pub text: String,
    /// Key-value metadata (`filename`, `file_path` for ingested files).
    pub metadata: Metadata,
    /// The vector embedding for `text`.
    pub embedding: Vec<f32>,
}

/// A stored document returned by a nearest-neighbour query, without its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Neighbor {
    /// The document id.
    pub id: String,
    /// The document text.
    pub text: String,
    /// The document metadata.
    pub metadata: Metadata,
    /// Distance to the query embedding (lower is closer).
    pub distance: f32,
}

/// Batched query response: one inner list per query text, each ordered by
/// ascending distance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    /// Document ids per query.
    pub ids: Vec<Vec<String>>,
    /// Document texts per query.
    pub documents: Vec<Vec<String>>,
    /// Document metadata per query.
    pub metadatas: Vec<Vec<Metadata>>,
    /// Distances per query.
    pub distances: Vec<Vec<f32>>,
}

impl QueryResponse {
    /// Append the neighbours found for one query text as a new batch entry.
    pub fn push_batch(&mut self, neighbors: Vec<Neighbor>) {
        let mut ids = Vec::with_capacity(neighbors.len());
        let mut documents = Vec::with_capacity(neighbors.len());
        let mut metadatas = Vec::with_capacity(neighbors.len());
        let mut distances = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            ids.push(neighbor.id);
            documents.push(neighbor.text);
            metadatas.push(neighbor.metadata);
            distances.push(neighbor.distance);
        }
        self.ids.push(ids);
        self.documents.push(documents);
        self.metadatas.push(metadatas);
        self.distances.push(distances);
    }

    /// Reassemble the neighbours of the query at `index`.
    ///
    /// A missing batch yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the parallel lists of the batch
    /// disagree in length.
    pub fn batch(&self, index: usize) -> Result<Vec<Neighbor>> {
        let Some(documents) = self.documents.get(index) else {
            return Ok(Vec::new());
        };
        let ids = self.ids.get(index).map(Vec::as_slice).unwrap_or_default();
        let metadatas = self.metadatas.get(index).map(Vec::as_slice).unwrap_or_default();
        let distances = self.distances.get(index).map(Vec::as_slice).unwrap_or_default();

        let len = documents.len();
        if ids.len() != len || metadatas.len() != len || distances.len() != len {
            return Err(RagError::PipelineError(format!(
                "malformed query response: {} ids, {len} documents, {} metadatas, {} distances",
                ids.len(),
                metadatas.len(),
                distances.len()
            )));
        }

        Ok(documents
            .iter()
            .enumerate()
            .map(|(i, text)| Neighbor {
                id: ids[i].clone(),
                text: text.clone(),
                metadata: metadatas[i].clone(),
                distance: distances[i],
            })
            .collect())
    }
}
