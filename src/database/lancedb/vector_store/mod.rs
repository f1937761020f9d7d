
use super::{CollectionStatus, Payload, ScoredPoint};
use crate::ingest::SegmentMetadata;
use crate::{DocQaError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on rows read back by [`VectorStore::collection_content`]
pub const DEFAULT_CONTENT_LIMIT: usize = 1000;

/// Vector database store using LanceDB, one table per collection
pub struct VectorStore {
    connection: Connection,
    dimension: usize,
}

impl VectorStore {
    /// Open (or create) the vector database under the config directory
    #[inline]
    pub async fn new(config: &Config) -> Result<Self, DocQaError> {
        Self::open(
            &config.vector_database_path(),
            config.llm.embedding_dimension as usize,
        )
        .await
    }

    /// Open the vector database at `db_path` with a fixed vector dimension
    #[inline]
    pub async fn open(db_path: &Path, dimension: usize) -> Result<Self, DocQaError> {
        if dimension == 0 {
            return Err(DocQaError::Database(
                "Vector dimension must be greater than zero".to_string(),
            ));
        }

        debug!("Initializing LanceDB at path: {:?}", db_path);
        std::fs::create_dir_all(db_path).map_err(|e| {
            DocQaError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        info!("Vector store opened with {} dimensions", dimension);
        Ok(Self {
            connection,
            dimension,
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Look up a collection, creating it when it does not exist
    #[inline]
    pub async fn get_or_create(&self, collection: &str) -> Result<CollectionStatus, DocQaError> {
        if self.collection_exists(collection).await? {
            let points = self.point_count(collection).await?;
            debug!("Collection {} exists with {} points", collection, points);
            return Ok(if points > 0 {
                CollectionStatus::Populated { points }
            } else {
                CollectionStatus::Empty { created: false }
            });
        }

        info!("Creating collection {}", collection);
        self.connection
            .create_empty_table(collection, self.schema())
            .execute()
            .await
            .map_err(|e| {
                DocQaError::Database(format!("Failed to create collection {}: {}", collection, e))
            })?;

        Ok(CollectionStatus::Empty { created: true })
    }

    /// Write points with ids `1..=N`, replacing any existing point with the same id
    #[inline]
    pub async fn upsert(
        &self,
        collection: &str,
        vectors: &[Vec<f32>],
        payloads: &[Payload],
    ) -> Result<usize, DocQaError> {
        if vectors.len() != payloads.len() {
            return Err(DocQaError::Database(format!(
                "Vector and payload counts differ: {} vs {}",
                vectors.len(),
                payloads.len()
            )));
        }
        if vectors.is_empty() {
            debug!("No points to upsert into {}", collection);
            return Ok(0);
        }

        let record_batch = self.create_record_batch(vectors, payloads)?;
        let table = self.open_table(collection).await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge.execute(Box::new(reader)).await.map_err(|e| {
            DocQaError::Database(format!("Failed to upsert into {}: {}", collection, e))
        })?;

        info!("Upserted {} points into {}", vectors.len(), collection);
        Ok(vectors.len())
    }

    /// Cosine nearest neighbours, at most `limit`, best first
    #[inline]
    pub async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, DocQaError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        debug!("Searching {} with limit: {}", collection, limit);

        let table = self.open_table(collection).await?;
        let results = table
            .vector_search(query_vector)
            .map_err(|e| DocQaError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to execute search: {}", e)))?;

        let mut points = collect_points(results).await?;
        points.sort_by(|a, b| b.score.total_cmp(&a.score));
        points.truncate(limit);

        debug!("Search in {} returned {} points", collection, points.len());
        Ok(points)
    }

    /// Number of points in a collection
    #[inline]
    pub async fn point_count(&self, collection: &str) -> Result<u64, DocQaError> {
        let table = self.open_table(collection).await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    #[inline]
    pub async fn list_collections(&self) -> Result<Vec<String>, DocQaError> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to list collections: {}", e)))
    }

    #[inline]
    pub async fn collection_exists(&self, collection: &str) -> Result<bool, DocQaError> {
        Ok(self
            .list_collections()
            .await?
            .iter()
            .any(|name| name == collection))
    }

    /// Drop a collection; returns false when it did not exist
    #[inline]
    pub async fn delete_collection(&self, collection: &str) -> Result<bool, DocQaError> {
        if !self.collection_exists(collection).await? {
            warn!("Collection {} does not exist", collection);
            return Ok(false);
        }

        self.connection.drop_table(collection).await.map_err(|e| {
            DocQaError::Database(format!("Failed to drop collection {}: {}", collection, e))
        })?;

        info!("Deleted collection {}", collection);
        Ok(true)
    }

    /// Chunk texts of a collection concatenated in id order
    #[inline]
    pub async fn collection_content(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<String, DocQaError> {
        let table = self.open_table(collection).await?;
        let results = table
            .query()
            .limit(limit)
            .execute()
            .await
            .map_err(|e| DocQaError::Database(format!("Failed to read collection: {}", e)))?;

        let mut points = collect_points(results).await?;
        points.sort_by_key(|point| point.id);

        Ok(points
            .into_iter()
            .map(|point| point.payload.page_content)
            .collect())
    }

    async fn open_table(&self, collection: &str) -> Result<Table, DocQaError> {
        self.connection
            .open_table(collection)
            .execute()
            .await
            .map_err(|e| {
                DocQaError::Database(format!("Failed to open collection {}: {}", collection, e))
            })
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::UInt64, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                false,
            ),
            Field::new("page_content", DataType::Utf8, false),
            Field::new("file_name", DataType::Utf8, false),
            Field::new("page_number", DataType::UInt32, true),
            Field::new("total_pages", DataType::UInt32, true),
            Field::new("extra", DataType::Utf8, false),
        ]))
    }

    fn create_record_batch(
        &self,
        vectors: &[Vec<f32>],
        payloads: &[Payload],
    ) -> Result<RecordBatch, DocQaError> {
        let len = vectors.len();

        let mut flat_values = Vec::with_capacity(len * self.dimension);
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(DocQaError::Database(format!(
                    "Vector {} has {} dimensions, expected {}",
                    i + 1,
                    vector.len(),
                    self.dimension
                )));
            }
            flat_values.extend_from_slice(vector);
        }

        let mut extras = Vec::with_capacity(len);
        for payload in payloads {
            let extra = serde_json::to_string(&payload.metadata.extra).map_err(|e| {
                DocQaError::Database(format!("Failed to serialize metadata: {}", e))
            })?;
            extras.push(extra);
        }

        let ids: Vec<u64> = (1..=len as u64).collect();
        let contents: Vec<&str> = payloads.iter().map(|p| p.page_content.as_str()).collect();
        let file_names: Vec<&str> = payloads
            .iter()
            .map(|p| p.metadata.file_name.as_str())
            .collect();
        let page_numbers: Vec<Option<u32>> =
            payloads.iter().map(|p| p.metadata.page_number).collect();
        let total_pages: Vec<Option<u32>> =
            payloads.iter().map(|p| p.metadata.total_pages).collect();

        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.dimension as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| DocQaError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(UInt64Array::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(file_names)),
            Arc::new(UInt32Array::from(page_numbers)),
            Arc::new(UInt32Array::from(total_pages)),
            Arc::new(StringArray::from(extras)),
        ];

        RecordBatch::try_new(self.schema(), arrays)
            .map_err(|e| DocQaError::Database(format!("Failed to create record batch: {}", e)))
    }
}

async fn collect_points(
    mut results: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<ScoredPoint>, DocQaError> {
    let mut points = Vec::new();

    while let Some(batch) = results
        .try_next()
        .await
        .map_err(|e| DocQaError::Database(format!("Failed to read result stream: {}", e)))?
    {
        points.extend(parse_batch(&batch)?);
    }

    Ok(points)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, DocQaError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| DocQaError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| DocQaError::Database(format!("Invalid {} column type", name)))
}

fn parse_batch(batch: &RecordBatch) -> Result<Vec<ScoredPoint>, DocQaError> {
    let ids = column::<UInt64Array>(batch, "id")?;
    let contents = column::<StringArray>(batch, "page_content")?;
    let file_names = column::<StringArray>(batch, "file_name")?;
    let page_numbers = column::<UInt32Array>(batch, "page_number")?;
    let total_pages = column::<UInt32Array>(batch, "total_pages")?;
    let extras = column::<StringArray>(batch, "extra")?;

    // Only present on vector searches
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut points = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let extra = serde_json::from_str(extras.value(row)).map_err(|e| {
            DocQaError::Database(format!("Failed to parse stored metadata: {}", e))
        })?;

        let distance = distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

        points.push(ScoredPoint {
            id: ids.value(row),
            score: 1.0 - distance,
            payload: Payload {
                page_content: contents.value(row).to_string(),
                metadata: SegmentMetadata {
                    file_name: file_names.value(row).to_string(),
                    page_number: (!page_numbers.is_null(row)).then(|| page_numbers.value(row)),
                    total_pages: (!total_pages.is_null(row)).then(|| total_pages.value(row)),
                    extra,
                },
            },
        });
    }

    Ok(points)
}
