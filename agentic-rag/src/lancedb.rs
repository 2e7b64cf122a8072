//! LanceDB vector store.
//!
//! Only available with the `lancedb` feature. Each collection is one Lance
//! table under the store directory with columns `id`, `text`, `metadata`
//! (a JSON object) and a fixed-size `vector`. The table is created by the
//! first upsert, which fixes its dimensions. Collection info (metric,
//! embedding model, dimensions) is kept in the `__collections` table.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ::lancedb::query::{ExecutableQuery, QueryBase};
use ::lancedb::{Connection, DistanceType, Table};
use arrow_array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator,
    RecordBatchReader, StringArray, UInt32Array,
};
use arrow_schema::{DataType, Field, FieldRef, Schema, SchemaRef};
use async_trait::async_trait;
use futures::TryStreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::document::{Document, Metadata, Neighbor};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionInfo, CollectionOptions, DistanceMetric, VectorStore};

const BACKEND: &str = "LanceDB";
const REGISTRY_TABLE: &str = "__collections";

fn lance_err(e: impl fmt::Display) -> RagError {
    RagError::store(BACKEND, e.to_string())
}

fn distance_type(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::SquaredL2 => DistanceType::L2,
        DistanceMetric::Cosine => DistanceType::Cosine,
        DistanceMetric::InnerProduct => DistanceType::Dot,
    }
}

/// Quote a value for a SQL string literal in a Lance filter.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name != REGISTRY_TABLE
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(RagError::store(BACKEND, format!("invalid collection name '{name}'")))
    }
}

fn missing(collection: &str) -> RagError {
    RagError::store(BACKEND, format!("collection '{collection}' does not exist"))
}

fn reader(batch: RecordBatch) -> Box<dyn RecordBatchReader + Send> {
    let schema = batch.schema();
    Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema))
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| RagError::store(BACKEND, format!("column '{name}' is missing or mistyped")))
}

fn registry_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("metric", DataType::Utf8, false),
        Field::new("embedding_model", DataType::Utf8, true),
        Field::new("dimensions", DataType::UInt32, true),
    ]))
}

fn info_batch(info: &CollectionInfo) -> Result<RecordBatch> {
    let dimensions = info
        .dimensions
        .map(u32::try_from)
        .transpose()
        .map_err(|_| RagError::store(BACKEND, "embedding dimensions out of range"))?;
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec![info.name.as_str()])),
        Arc::new(StringArray::from(vec![info.metric.as_str()])),
        Arc::new(StringArray::from(vec![info.embedding_model.as_deref()])),
        Arc::new(UInt32Array::from(vec![dimensions])),
    ];
    RecordBatch::try_new(registry_schema(), columns).map_err(lance_err)
}

fn decode_infos(batch: &RecordBatch) -> Result<Vec<CollectionInfo>> {
    let names = column::<StringArray>(batch, "name")?;
    let metrics = column::<StringArray>(batch, "metric")?;
    let models = column::<StringArray>(batch, "embedding_model")?;
    let dimensions = column::<UInt32Array>(batch, "dimensions")?;
    (0..batch.num_rows())
        .map(|i| {
            Ok(CollectionInfo {
                name: names.value(i).to_string(),
                metric: metrics.value(i).parse()?,
                embedding_model: models.is_valid(i).then(|| models.value(i).to_string()),
                dimensions: dimensions.is_valid(i).then(|| dimensions.value(i) as usize),
            })
        })
        .collect()
}

fn vector_item() -> FieldRef {
    Arc::new(Field::new("item", DataType::Float32, true))
}

fn document_schema(dims: i32) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new("vector", DataType::FixedSizeList(vector_item(), dims), false),
    ]))
}

fn document_batch(documents: &[&Document], dims: usize) -> Result<RecordBatch> {
    let dims = i32::try_from(dims)
        .map_err(|_| RagError::store(BACKEND, "embedding dimensions out of range"))?;
    let metadata = documents
        .iter()
        .map(|d| serde_json::to_string(&d.metadata))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let values = Float32Array::from_iter_values(
        documents.iter().flat_map(|d| d.embedding.iter().copied()),
    );
    let vectors = FixedSizeListArray::try_new(vector_item(), dims, Arc::new(values), None)
        .map_err(lance_err)?;

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(documents.iter().map(|d| d.id.as_str()))),
        Arc::new(StringArray::from_iter_values(documents.iter().map(|d| d.text.as_str()))),
        Arc::new(StringArray::from(metadata)),
        Arc::new(vectors),
    ];
    RecordBatch::try_new(document_schema(dims), columns).map_err(lance_err)
}

/// `(id, text, metadata)` of every row.
fn decode_rows(batch: &RecordBatch) -> Result<Vec<(String, String, Metadata)>> {
    let ids = column::<StringArray>(batch, "id")?;
    let texts = column::<StringArray>(batch, "text")?;
    let metadata = column::<StringArray>(batch, "metadata")?;
    (0..batch.num_rows())
        .map(|i| {
            Ok((
                ids.value(i).to_string(),
                texts.value(i).to_string(),
                serde_json::from_str(metadata.value(i))?,
            ))
        })
        .collect()
}

fn decode_vectors(batch: &RecordBatch) -> Result<Vec<Vec<f32>>> {
    let vectors = column::<FixedSizeListArray>(batch, "vector")?;
    (0..batch.num_rows())
        .map(|i| {
            let row = vectors.value(i);
            row.as_any()
                .downcast_ref::<Float32Array>()
                .map(|floats| floats.values().to_vec())
                .ok_or_else(|| RagError::store(BACKEND, "vector column is not float32"))
        })
        .collect()
}

/// A [`VectorStore`] backed by an embedded LanceDB database directory.
///
/// # Example
///
/// ```rust,ignore
/// use agentic_rag::{CollectionOptions, LanceDbVectorStore, VectorStore};
///
/// let store = LanceDbVectorStore::open("db").await?;
/// store.get_or_create_collection("tax_docs", &CollectionOptions::default()).await?;
/// ```
pub struct LanceDbVectorStore {
    root: PathBuf,
    connection: Connection,
    // Serializes collection creation and the first write that fixes dimensions.
    write_lock: Mutex<()>,
}

impl fmt::Debug for LanceDbVectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanceDbVectorStore").field("root", &self.root).finish_non_exhaustive()
    }
}

impl LanceDbVectorStore {
    /// Connect to (and create if absent) the database at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        let uri = root.to_str().ok_or_else(|| {
            RagError::ConfigError(format!("store path {} is not valid UTF-8", root.display()))
        })?;
        let connection = ::lancedb::connect(uri).execute().await.map_err(lance_err)?;

        let tables = connection.table_names().execute().await.map_err(lance_err)?;
        if !tables.iter().any(|t| t == REGISTRY_TABLE) {
            connection
                .create_empty_table(REGISTRY_TABLE, registry_schema())
                .execute()
                .await
                .map_err(lance_err)?;
        }
        debug!(root = %root.display(), "opened LanceDB vector store");
        Ok(Self { root, connection, write_lock: Mutex::new(()) })
    }

    /// The database directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn table(&self, name: &str) -> Result<Table> {
        self.connection.open_table(name).execute().await.map_err(lance_err)
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let tables = self.connection.table_names().execute().await.map_err(lance_err)?;
        Ok(tables.iter().any(|t| t == name))
    }

    async fn read_infos(&self, filter: Option<String>) -> Result<Vec<CollectionInfo>> {
        let mut query = self.table(REGISTRY_TABLE).await?.query();
        if let Some(filter) = filter {
            query = query.only_if(filter);
        }
        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(lance_err)?
            .try_collect()
            .await
            .map_err(lance_err)?;

        let mut infos = Vec::new();
        for batch in &batches {
            infos.extend(decode_infos(batch)?);
        }
        Ok(infos)
    }

    async fn info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        validate_name(name)?;
        let infos = self.read_infos(Some(format!("name = {}", quote(name)))).await?;
        Ok(infos.into_iter().next())
    }

    async fn require(&self, name: &str) -> Result<CollectionInfo> {
        self.info(name).await?.ok_or_else(|| missing(name))
    }

    async fn write_info(&self, info: &CollectionInfo) -> Result<()> {
        let registry = self.table(REGISTRY_TABLE).await?;
        let mut merge = registry.merge_insert(&["name"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge.execute(reader(info_batch(info)?)).await.map_err(lance_err)?;
        Ok(())
    }

    async fn merge_documents(&self, collection: &str, batch: RecordBatch) -> Result<()> {
        let table = self.table(collection).await?;
        let mut merge = table.merge_insert(&["id"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge.execute(reader(batch)).await.map_err(lance_err)?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LanceDbVectorStore {
    async fn get_or_create_collection(
        &self,
        name: &str,
        options: &CollectionOptions,
    ) -> Result<CollectionInfo> {
        if let Some(info) = self.info(name).await? {
            return Ok(info);
        }
        let _guard = self.write_lock.lock().await;
        if let Some(info) = self.info(name).await? {
            return Ok(info);
        }

        let info = CollectionInfo {
            name: name.to_string(),
            metric: options.metric,
            embedding_model: options.embedding_model.clone(),
            dimensions: None,
        };
        self.write_info(&info).await?;
        info!(collection = name, metric = ?options.metric, "created collection");
        Ok(info)
    }

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let info = self.require(collection).await?;
        let dims = info.check_dimensions(documents, BACKEND)?;

        // Last occurrence of an id within the batch wins.
        let latest: BTreeMap<&str, &Document> =
            documents.iter().map(|d| (d.id.as_str(), d)).collect();
        let unique: Vec<&Document> = latest.into_values().collect();
        let batch = document_batch(&unique, dims)?;

        if info.dimensions.is_some() || self.table_exists(collection).await? {
            self.merge_documents(collection, batch).await?;
        } else {
            self.connection
                .create_table(collection, reader(batch))
                .execute()
                .await
                .map_err(lance_err)?;
        }
        if info.dimensions.is_none() {
            self.write_info(&CollectionInfo { dimensions: Some(dims), ..info }).await?;
        }
        debug!(collection, count = unique.len(), "merged documents");
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Neighbor>> {
        let info = self.require(collection).await?;
        if top_k == 0 || info.dimensions.is_none() {
            return Ok(Vec::new());
        }
        info.check_query(embedding, BACKEND)?;

        let batches: Vec<RecordBatch> = self
            .table(collection)
            .await?
            .query()
            .nearest_to(embedding.to_vec())
            .map_err(lance_err)?
            .distance_type(distance_type(info.metric))
            .limit(top_k)
            .execute()
            .await
            .map_err(lance_err)?
            .try_collect()
            .await
            .map_err(lance_err)?;

        let mut neighbors = Vec::new();
        for batch in &batches {
            let distances = column::<Float32Array>(batch, "_distance")?;
            for (i, (id, text, metadata)) in decode_rows(batch)?.into_iter().enumerate() {
                neighbors.push(Neighbor { id, text, metadata, distance: distances.value(i) });
            }
        }
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
        neighbors.truncate(top_k);
        Ok(neighbors)
    }

    async fn get(&self, collection: &str, ids: &[&str]) -> Result<Vec<Document>> {
        let info = self.require(collection).await?;
        if ids.is_empty() || info.dimensions.is_none() {
            return Ok(Vec::new());
        }

        let list = ids.iter().map(|id| quote(id)).collect::<Vec<_>>().join(", ");
        let batches: Vec<RecordBatch> = self
            .table(collection)
            .await?
            .query()
            .only_if(format!("id IN ({list})"))
            .limit(ids.len())
            .execute()
            .await
            .map_err(lance_err)?
            .try_collect()
            .await
            .map_err(lance_err)?;

        let mut found = HashMap::new();
        for batch in &batches {
            let rows = decode_rows(batch)?;
            for ((id, text, metadata), embedding) in rows.into_iter().zip(decode_vectors(batch)?) {
                found.insert(id.clone(), Document { id, text, metadata, embedding });
            }
        }
        Ok(ids.iter().filter_map(|id| found.remove(*id)).collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let info = self.require(collection).await?;
        if info.dimensions.is_none() {
            return Ok(0);
        }
        self.table(collection).await?.count_rows(None).await.map_err(lance_err)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> =
            self.read_infos(None).await?.into_iter().map(|info| info.name).collect();
        names.sort();
        Ok(names)
    }
}
