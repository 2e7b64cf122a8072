//! Retrieval: nearest-neighbour search plus the text renderings handed to agents.
//!
//! [`Retriever::search`] returns structured results. [`format_report`] and
//! [`format_compact`] render them; [`retrieve`] composes both and flattens
//! any error into text, for callers that can only receive a string.

use std::sync::Arc;

use tracing::{error, info};

use crate::collection::Collection;
use crate::config::RagConfig;
use crate::document::{FILENAME_KEY, Neighbor};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::vectorstore::VectorStore;

/// Characters of document body shown per result in [`format_report`].
pub const PREVIEW_CHARS: usize = 500;

/// Characters of document body shown per result in [`format_compact`].
pub const COMPACT_PREVIEW_CHARS: usize = 300;

/// Marker appended to truncated previews.
pub const ELLIPSIS: &str = "...";

/// Prefix of every error rendered by [`retrieve`].
pub const SEARCH_ERROR_PREFIX: &str = "Error searching ChromaDB: ";

/// The first `max_chars` characters of `text`, plus [`ELLIPSIS`] if cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}{ELLIPSIS}", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// Display relevance of a result: `1 - distance`, three decimals.
pub fn relevance(distance: f32) -> String {
    format!("{:.3}", 1.0 - distance)
}

/// The message returned when a query matches nothing.
pub fn no_results_message(query: &str) -> String {
    format!("No relevant documents found for query: '{query}'")
}

fn filename_or<'a>(result: &'a Neighbor, default: &'a str) -> &'a str {
    result.metadata.get(FILENAME_KEY).map_or(default, String::as_str)
}

/// Render results as numbered blocks separated by blank lines.
///
/// ```text
/// Document 1 (from deadlines.md, relevance: 0.812):
/// <first 500 characters>
/// ```
pub fn format_report(query: &str, results: &[Neighbor]) -> String {
    if results.is_empty() {
        return no_results_message(query);
    }
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "Document {} (from {}, relevance: {}):\n{}\n",
                i + 1,
                filename_or(result, "Unknown file"),
                relevance(result.distance),
                preview(&result.text, PREVIEW_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render results as `[filename]: preview` lines separated by blank lines.
pub fn format_compact(results: &[Neighbor]) -> String {
    if results.is_empty() {
        return "No documents found.".to_string();
    }
    results
        .iter()
        .map(|result| {
            format!(
                "[{}]: {}",
                filename_or(result, "Unknown"),
                preview(&result.text, COMPACT_PREVIEW_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Query `collection` for the `k` nearest documents and render the report.
///
/// Never fails: errors come back as text starting with [`SEARCH_ERROR_PREFIX`].
pub async fn retrieve(query: &str, collection: &Collection, k: usize) -> String {
    match search_collection(collection, query, k).await {
        Ok(results) => format_report(query, &results),
        Err(e) => {
            error!(collection = collection.name(), error = %e, "search failed");
            format!("{SEARCH_ERROR_PREFIX}{e}")
        }
    }
}

async fn search_collection(collection: &Collection, query: &str, k: usize) -> Result<Vec<Neighbor>> {
    let response = collection.query(&[query], k).await?;
    let results = response.batch(0)?;
    info!(collection = collection.name(), k, result_count = results.len(), "query completed");
    Ok(results)
}

/// Structured retrieval over one collection.
#[derive(Debug, Clone)]
pub struct Retriever {
    collection: Collection,
    top_k: usize,
}

impl Retriever {
    /// Wrap an open collection.
    pub fn new(collection: Collection, top_k: usize) -> Self {
        Self { collection, top_k }
    }

    /// Open the configured collection (get-or-create) for retrieval.
    pub async fn open(
        config: &RagConfig,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let collection =
            Collection::open(store, &config.collection_name, embedder, config.distance).await?;
        Ok(Self::new(collection, config.top_k))
    }

    /// The underlying collection.
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// The configured number of results.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The `top_k` nearest documents, ascending by distance.
    pub async fn search(&self, query: &str) -> Result<Vec<Neighbor>> {
        self.search_k(query, self.top_k).await
    }

    /// The `k` nearest documents, ascending by distance.
    pub async fn search_k(&self, query: &str, k: usize) -> Result<Vec<Neighbor>> {
        search_collection(&self.collection, query, k).await
    }

    /// [`search`](Self::search) rendered with [`format_report`], errors flattened.
    pub async fn report(&self, query: &str) -> String {
        retrieve(query, &self.collection, self.top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;

    fn result(filename: Option<&str>, text: &str, distance: f32) -> Neighbor {
        let mut metadata = Metadata::new();
        if let Some(name) = filename {
            metadata.insert(FILENAME_KEY.to_string(), name.to_string());
        }
        Neighbor { id: "id".into(), text: text.into(), metadata, distance }
    }

    #[test]
    fn preview_keeps_short_text_verbatim() {
        let text = "x".repeat(PREVIEW_CHARS);
        assert_eq!(preview(&text, PREVIEW_CHARS), text);
    }

    #[test]
    fn preview_truncates_by_characters() {
        let text = "é".repeat(PREVIEW_CHARS + 1);
        let out = preview(&text, PREVIEW_CHARS);
        assert_eq!(out.chars().count(), PREVIEW_CHARS + ELLIPSIS.len());
        assert!(out.ends_with(ELLIPSIS));
    }

    #[test]
    fn empty_results_name_the_query() {
        assert_eq!(
            format_report("tax deadline", &[]),
            "No relevant documents found for query: 'tax deadline'"
        );
    }

    #[test]
    fn report_numbers_blocks_and_separates_with_blank_line() {
        let results = [result(Some("a.md"), "Alpha", 0.25), result(None, "Beta", 0.5)];
        assert_eq!(
            format_report("q", &results),
            "Document 1 (from a.md, relevance: 0.750):\nAlpha\n\n\
             Document 2 (from Unknown file, relevance: 0.500):\nBeta\n"
        );
    }

    #[test]
    fn relevance_can_go_negative() {
        assert_eq!(relevance(1.5), "-0.500");
        assert_eq!(relevance(0.0), "1.000");
    }

    #[test]
    fn compact_rendering() {
        assert_eq!(format_compact(&[]), "No documents found.");
        let results = [result(Some("a.md"), "Alpha", 0.1), result(None, "Beta", 0.2)];
        assert_eq!(format_compact(&results), "[a.md]: Alpha\n\n[Unknown]: Beta");
    }
}
