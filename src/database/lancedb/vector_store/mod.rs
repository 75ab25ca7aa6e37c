#[cfg(test)]
mod tests;

use super::{ChunkMetadata, EmbeddingRecord};
use crate::AgentError;
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Prefix shared by every per-document table
pub const DOCUMENT_TABLE_PREFIX: &str = "doc_";

/// Vector database store using LanceDB for similarity search.
///
/// Each ingested document gets its own table so that replacing a document
/// never mixes its chunks with another one's.
pub struct VectorStore {
    connection: Connection,
    db_path: PathBuf,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    pub distance: f32,
}

impl VectorStore {
    /// Open (or create) the vector database under `index_dir`
    #[inline]
    pub async fn open(index_dir: &Path) -> Result<Self, AgentError> {
        std::fs::create_dir_all(index_dir).map_err(|e| {
            AgentError::Database(format!("Failed to create vector database directory: {e}"))
        })?;
        let db_path = index_dir.canonicalize().map_err(|e| {
            AgentError::Database(format!("Failed to resolve vector database path: {e}"))
        })?;
        debug!("Initializing LanceDB at path: {:?}", db_path);

        let uri = format!("file://{}", db_path.display());

        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt")
                    || error_msg.contains("invalid")
                    || error_msg.contains("malformed")
                {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(&db_path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        AgentError::Database(format!(
                            "Failed to connect to LanceDB after recovery: {e}"
                        ))
                    })?
                } else {
                    return Err(AgentError::Database(format!(
                        "Failed to connect to LanceDB: {e}"
                    )));
                }
            }
        };

        info!("Vector store opened at {}", db_path.display());
        Ok(Self {
            connection,
            db_path,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    #[inline]
    pub async fn table_names(&self) -> Result<Vec<String>, AgentError> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to list tables: {e}")))
    }

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim,
                ),
                false,
            ),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("page", DataType::UInt32, false),
            Field::new("start_index", DataType::UInt64, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Build a fresh table holding exactly `records`, replacing any table
    /// of the same name. All vectors must share one dimension.
    #[inline]
    pub async fn create_index(
        &self,
        table_name: &str,
        records: &[EmbeddingRecord],
    ) -> Result<(), AgentError> {
        let vector_dim = validate_dimensions(records)?;
        debug!(
            "Creating table {} with {} embeddings of dimension {}",
            table_name,
            records.len(),
            vector_dim
        );

        self.drop_table_if_exists(table_name).await?;

        let schema = Self::create_schema(vector_dim);
        self.connection
            .create_empty_table(table_name, Arc::clone(&schema))
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to create table: {e}")))?;

        let record_batch = Self::create_record_batch(schema, vector_dim, records)?;

        let table = self
            .connection
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to open table: {e}")))?;

        let batch_schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), batch_schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to insert embeddings: {e}")))?;

        info!(
            "Stored {} embeddings in table {}",
            records.len(),
            table_name
        );
        Ok(())
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(
        schema: Arc<Schema>,
        vector_dim: i32,
        records: &[EmbeddingRecord],
    ) -> Result<RecordBatch, AgentError> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * records[0].vector.len());
        let mut document_ids = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut pages = Vec::with_capacity(len);
        let mut start_indices = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            document_ids.push(record.metadata.document_id.as_str());
            chunk_indices.push(record.metadata.chunk_index);
            sources.push(record.metadata.source.as_str());
            pages.push(record.metadata.page);
            start_indices.push(record.metadata.start_index);
            contents.push(record.metadata.content.as_str());
            created_ats.push(record.metadata.created_at.as_str());
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim, Arc::new(values_array), None).map_err(
                |e| AgentError::Database(format!("Failed to create vector array: {e}")),
            )?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(pages)),
            Arc::new(UInt64Array::from(start_indices)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| AgentError::Database(format!("Failed to create record batch: {e}")))
    }

    /// The `limit` records nearest to `query_vector`, closest first
    #[inline]
    pub async fn search_similar(
        &self,
        table_name: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, AgentError> {
        debug!(
            "Searching {} for similar vectors with limit: {}",
            table_name, limit
        );

        let table = self
            .connection
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to open table: {e}")))?;

        let results = table
            .vector_search(query_vector)
            .map_err(|e| AgentError::Database(format!("Failed to create vector search: {e}")))?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to execute search: {e}")))?;

        let mut search_results = Self::parse_search_results_stream(results).await?;
        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(search_results)
    }

    /// Parse search results from LanceDB stream into SearchResult structs
    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>, AgentError> {
        let mut search_results = Vec::new();

        while let Some(batch_result) = results
            .try_next()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to read result stream: {e}")))?
        {
            search_results.extend(Self::parse_search_batch(&batch_result)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, AgentError> {
        let document_ids = string_column(batch, "document_id")?;
        let chunk_indices = u32_column(batch, "chunk_index")?;
        let sources = string_column(batch, "source")?;
        let pages = u32_column(batch, "page")?;
        let start_indices = batch
            .column_by_name("start_index")
            .ok_or_else(|| AgentError::Database("Missing start_index column".to_string()))?
            .as_any()
            .downcast_ref::<UInt64Array>()
            .ok_or_else(|| AgentError::Database("Invalid start_index column type".to_string()))?;
        let contents = string_column(batch, "content")?;
        let created_ats = string_column(batch, "created_at")?;

        // Only present on vector queries
        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut search_results = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let chunk_metadata = ChunkMetadata {
                document_id: document_ids.value(row).to_string(),
                chunk_index: chunk_indices.value(row),
                source: sources.value(row).to_string(),
                page: pages.value(row),
                start_index: start_indices.value(row),
                content: contents.value(row).to_string(),
                created_at: created_ats.value(row).to_string(),
            };

            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            search_results.push(SearchResult {
                chunk_metadata,
                distance,
            });
        }

        Ok(search_results)
    }

    #[inline]
    pub async fn count_embeddings(&self, table_name: &str) -> Result<usize, AgentError> {
        let table = self
            .connection
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to open table: {e}")))?;

        table
            .count_rows(None)
            .await
            .map_err(|e| AgentError::Database(format!("Failed to count rows: {e}")))
    }

    /// Drop `table_name` if present; returns whether anything was dropped
    #[inline]
    pub async fn drop_table_if_exists(&self, table_name: &str) -> Result<bool, AgentError> {
        let table_names = self.table_names().await?;

        if !table_names.iter().any(|name| name == table_name) {
            return Ok(false);
        }

        info!("Dropping table {}", table_name);
        self.connection
            .drop_table(table_name)
            .await
            .map_err(|e| AgentError::Database(format!("Failed to drop table: {e}")))?;
        Ok(true)
    }

    /// Drop every per-document table. Used at startup since no document
    /// survives a restart.
    #[inline]
    pub async fn clear_document_tables(&self) -> Result<usize, AgentError> {
        let mut dropped = 0;
        for name in self.table_names().await? {
            if !name.starts_with(DOCUMENT_TABLE_PREFIX) {
                continue;
            }
            match self.connection.drop_table(&name).await {
                Ok(()) => dropped += 1,
                Err(e) => warn!("Failed to drop stale table {}: {}", name, e),
            }
        }

        if dropped > 0 {
            info!("Removed {} stale document tables", dropped);
        }
        Ok(dropped)
    }

    fn attempt_corruption_recovery(db_path: &Path) -> Result<(), AgentError> {
        warn!("Attempting database corruption recovery at {:?}", db_path);

        if db_path.exists() {
            let backup_path = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted database: {}", e);
            } else {
                info!("Corrupted database backed up to {:?}", backup_path);
            }
        }

        if db_path.exists() {
            std::fs::remove_dir_all(db_path).map_err(|e| {
                AgentError::Database(format!("Failed to remove corrupted database: {e}"))
            })?;
        }
        std::fs::create_dir_all(db_path).map_err(|e| {
            AgentError::Database(format!("Failed to recreate vector database directory: {e}"))
        })?;

        info!("Database corruption recovery completed");
        Ok(())
    }
}

/// Shared vector width of `records` as an Arrow list size
fn validate_dimensions(records: &[EmbeddingRecord]) -> Result<i32, AgentError> {
    let first = records
        .first()
        .ok_or_else(|| AgentError::Database("Cannot build an index without records".to_string()))?;
    let dim = first.vector.len();

    if dim == 0 {
        return Err(AgentError::Database("Embeddings must not be empty".to_string()));
    }

    if let Some(odd) = records.iter().find(|r| r.vector.len() != dim) {
        return Err(AgentError::Database(format!(
            "Inconsistent embedding dimensions: expected {dim}, got {}",
            odd.vector.len()
        )));
    }

    i32::try_from(dim)
        .map_err(|_| AgentError::Database(format!("Embedding dimension {dim} is too large")))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, AgentError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AgentError::Database(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| AgentError::Database(format!("Invalid {name} column type")))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array, AgentError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AgentError::Database(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| AgentError::Database(format!("Invalid {name} column type")))
}
