// LanceDB vector database module
// Handles vector storage and similarity search for chunk embeddings


pub mod vector_store;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embeddings::DocumentChunk;

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique identifier for this embedding
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Metadata for a chunk stored alongside its embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Document the chunk was cut from
    pub document_id: String,
    /// Position of the chunk within the document
    pub chunk_index: u32,
    /// Path of the uploaded file
    pub source: String,
    /// Zero-based page index
    pub page: u32,
    /// Character offset within the page text
    pub start_index: u64,
    pub content: String,
    pub created_at: String,
}

impl EmbeddingRecord {
    #[inline]
    pub fn from_chunk(
        document_id: &str,
        chunk_index: u32,
        chunk: &DocumentChunk,
        vector: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            metadata: ChunkMetadata {
                document_id: document_id.to_string(),
                chunk_index,
                source: chunk.source.clone(),
                page: chunk.page,
                start_index: u64::try_from(chunk.start_index).unwrap_or(u64::MAX),
                content: chunk.content.clone(),
                created_at: Utc::now().to_rfc3339(),
            },
        }
    }
}
