#[cfg(test)]
mod tests;

use super::{ChunkRecord, ScoredChunk};
use crate::{SiteChatError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
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

const TABLE_NAME: &str = "chunks";

/// Chunk store using LanceDB for cosine similarity search
#[derive(Clone)]
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    dimension: usize,
}

impl VectorStore {
    /// Open the store under the configured base directory, sized for the
    /// configured embedding dimension
    #[inline]
    pub async fn open(config: &Config) -> Result<Self, SiteChatError> {
        Self::open_at(
            &config.vector_database_path(),
            config.gemini.embedding_dimension as usize,
        )
        .await
    }

    #[inline]
    pub async fn open_at(path: &Path, dimension: usize) -> Result<Self, SiteChatError> {
        if dimension == 0 {
            return Err(SiteChatError::Database(
                "Vector dimension must be greater than zero".to_string(),
            ));
        }

        debug!("Initializing LanceDB at path: {:?}", path);
        std::fs::create_dir_all(path).map_err(|e| {
            SiteChatError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = path.to_string_lossy().into_owned();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let store = Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            dimension,
        };
        store.initialize_table().await?;

        info!("Vector store ready with {} dimensions", dimension);
        Ok(store)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Create the chunk table, or check an existing one matches the dimension.
    /// An empty table of another dimension is recreated.
    async fn initialize_table(&self) -> Result<(), SiteChatError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to list tables: {}", e)))?;

        if !table_names.contains(&self.table_name) {
            info!(
                "Creating chunk table with {} dimensions",
                self.dimension
            );
            return self.create_table().await;
        }

        let existing = self.detect_existing_dimension().await?;
        if existing == self.dimension {
            debug!("Chunk table already exists with {} dimensions", existing);
            return Ok(());
        }

        let rows = self.count_chunks().await?;
        if rows > 0 {
            return Err(SiteChatError::Database(format!(
                "Chunk table holds {} vectors of dimension {}, but {} is configured; re-ingest into a new data directory or restore the previous dimension",
                rows, existing, self.dimension
            )));
        }

        warn!(
            "Recreating empty chunk table: dimension {} -> {}",
            existing, self.dimension
        );
        self.connection
            .drop_table(&self.table_name)
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to drop table: {}", e)))?;
        self.create_table().await
    }

    async fn create_table(&self) -> Result<(), SiteChatError> {
        self.connection
            .create_empty_table(&self.table_name, self.create_schema())
            .execute()
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    async fn detect_existing_dimension(&self) -> Result<usize, SiteChatError> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                SiteChatError::Database(
                    "Could not find vector column or determine dimension".to_string(),
                )
            })
    }

    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.dimension as i32,
                ),
                false,
            ),
            Field::new("text", DataType::Utf8, false),
            Field::new("source_url", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    async fn open_table(&self) -> Result<Table, SiteChatError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to open table: {}", e)))
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), SiteChatError> {
        if vector.len() == self.dimension {
            Ok(())
        } else {
            Err(SiteChatError::Database(format!(
                "Vector has {} dimensions, expected {}",
                vector.len(),
                self.dimension
            )))
        }
    }

    /// Replace every chunk of `source` with `records`. Nothing is deleted if
    /// any record has the wrong dimension.
    #[inline]
    pub async fn replace_source_chunks(
        &self,
        source: &str,
        records: &[ChunkRecord],
    ) -> Result<usize, SiteChatError> {
        for record in records {
            self.check_dimension(&record.vector)?;
            if record.source_url != source {
                return Err(SiteChatError::Database(format!(
                    "Chunk {} belongs to {}, not {}",
                    record.id, record.source_url, source
                )));
            }
        }

        self.delete_source_chunks(source).await?;

        if records.is_empty() {
            debug!("No chunks to store for {}", source);
            return Ok(0);
        }

        let record_batch = self.create_record_batch(records)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        self.open_table()
            .await?
            .add(reader)
            .execute()
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to insert chunks: {}", e)))?;

        info!("Stored {} chunks for {}", records.len(), source);
        Ok(records.len())
    }

    /// Delete every chunk stored for `source`
    #[inline]
    pub async fn delete_source_chunks(&self, source: &str) -> Result<(), SiteChatError> {
        debug!("Deleting chunks for source: {}", source);

        self.open_table()
            .await?
            .delete(&source_predicate(source))
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to delete chunks: {}", e)))?;

        Ok(())
    }

    #[inline]
    pub async fn count_chunks(&self) -> Result<usize, SiteChatError> {
        self.open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to count rows: {}", e)))
    }

    #[inline]
    pub async fn count_source_chunks(&self, source: &str) -> Result<usize, SiteChatError> {
        self.open_table()
            .await?
            .count_rows(Some(source_predicate(source)))
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Any one stored chunk, for a quick look at what has been ingested
    #[inline]
    pub async fn sample_chunk(&self) -> Result<Option<ChunkRecord>, SiteChatError> {
        let mut results = self
            .open_table()
            .await?
            .query()
            .limit(1)
            .execute()
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to query chunks: {}", e)))?;

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to read result stream: {}", e)))?
        {
            if let Some((record, _)) = parse_batch(&batch)?.into_iter().next() {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    /// Nearest chunks to `query_vector` by cosine distance, best first
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, SiteChatError> {
        self.check_dimension(query_vector)?;
        debug!("Searching for similar vectors with limit: {}", limit);

        let mut results = self
            .open_table()
            .await?
            .vector_search(query_vector)
            .map_err(|e| SiteChatError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| SiteChatError::Database(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(score_rows(parse_batch(&batch)?)?);
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);

        debug!("Vector search returned {} results", hits.len());
        Ok(hits)
    }

    fn create_record_batch(&self, records: &[ChunkRecord]) -> Result<RecordBatch, SiteChatError> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.dimension);
        let mut texts = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            texts.push(record.text.as_str());
            sources.push(record.source_url.as_str());
            chunk_indices.push(record.chunk_index);
            created_ats.push(record.created_at.as_str());
        }

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.dimension as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| SiteChatError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(self.create_schema(), arrays)
            .map_err(|e| SiteChatError::Database(format!("Failed to create record batch: {}", e)))
    }
}

/// Filter matching every row of `source`
fn source_predicate(source: &str) -> String {
    format!("source_url = '{}'", escape_literal(source))
}

/// Escape a value for use inside a single-quoted SQL string literal
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, SiteChatError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| SiteChatError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| SiteChatError::Database(format!("Invalid {} column type", name)))
}

/// Turn search rows into hits. A row without a distance cannot be ranked.
fn score_rows(
    rows: Vec<(ChunkRecord, Option<f32>)>,
) -> Result<Vec<ScoredChunk>, SiteChatError> {
    rows.into_iter()
        .map(|(chunk, distance)| {
            let distance = distance.ok_or_else(|| {
                SiteChatError::Database(format!(
                    "Search result {} is missing _distance",
                    chunk.id
                ))
            })?;
            Ok(ScoredChunk {
                chunk,
                score: 1.0 - distance,
                distance,
            })
        })
        .collect()
}

/// Rows of a result batch, each with its `_distance` when the query produced one
fn parse_batch(batch: &RecordBatch) -> Result<Vec<(ChunkRecord, Option<f32>)>, SiteChatError> {
    let ids = string_column(batch, "id")?;
    let texts = string_column(batch, "text")?;
    let sources = string_column(batch, "source_url")?;
    let created_ats = string_column(batch, "created_at")?;

    let chunk_indices = batch
        .column_by_name("chunk_index")
        .ok_or_else(|| SiteChatError::Database("Missing chunk_index column".to_string()))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| SiteChatError::Database("Invalid chunk_index column type".to_string()))?;

    let vectors = batch
        .column_by_name("vector")
        .and_then(|col| col.as_any().downcast_ref::<FixedSizeListArray>());

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let vector = vectors
            .map(|list| list.value(row))
            .and_then(|values| {
                values
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .map(|floats| floats.values().to_vec())
            })
            .unwrap_or_default();

        let distance = distances.and_then(|d| (!d.is_null(row)).then(|| d.value(row)));

        rows.push((
            ChunkRecord {
                id: ids.value(row).to_string(),
                vector,
                text: texts.value(row).to_string(),
                source_url: sources.value(row).to_string(),
                chunk_index: chunk_indices.value(row),
                created_at: created_ats.value(row).to_string(),
            },
            distance,
        ));
    }

    debug!("Parsed {} rows", rows.len());
    Ok(rows)
}
