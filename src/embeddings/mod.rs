// Embeddings module
// Text chunking and the embedding capability the engine depends on

pub mod chunking;

use async_trait::async_trait;

pub use chunking::{
    ChunkingConfig, DocumentChunk, chunk_pages, discard_blank_chunks, split_text,
};

/// Turns text into fixed-length vectors. Documents and queries may be
/// embedded differently by the backing model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order
    async fn embed_documents(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> crate::Result<Vec<f32>>;
}
