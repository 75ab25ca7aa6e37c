use std::sync::Arc;
use tracing::debug;

use super::{ChatModel, PromptTemplate};
use crate::Result;
use crate::database::{SearchResult, VectorStore};
use crate::embeddings::Embedder;

/// Retriever, prompt and model bound to one document's table
pub struct RetrievalChain {
    store: Arc<VectorStore>,
    table_name: String,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
    template: PromptTemplate,
    top_k: usize,
    temperature: f32,
}

impl RetrievalChain {
    #[inline]
    pub fn new(
        store: Arc<VectorStore>,
        table_name: String,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
        template: PromptTemplate,
        top_k: usize,
        temperature: f32,
    ) -> Self {
        Self {
            store,
            table_name,
            embedder,
            model,
            template,
            top_k,
            temperature,
        }
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The `top_k` chunks closest to `question`, best match first
    #[inline]
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        let query_vector = self.embedder.embed_query(question).await?;
        let results = self
            .store
            .search_similar(&self.table_name, &query_vector, self.top_k)
            .await?;
        debug!(
            "Retrieved {} chunks from {}",
            results.len(),
            self.table_name
        );
        Ok(results)
    }

    /// Answer as returned by the model, unmodified
    #[inline]
    pub async fn invoke(&self, question: &str) -> Result<String> {
        let results = self.retrieve(question).await?;
        let context = format_context(&results);
        let prompt = self.template.render(&context, question);
        self.model.complete(&prompt, self.temperature).await
    }
}

/// Chunk texts in rank order separated by blank lines
#[inline]
pub fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|result| result.chunk_metadata.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
