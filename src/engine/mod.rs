// Engine module
// Per-document ingestion and retrieval chains, plus the single-document session

mod chain;
pub mod prompt;
mod session;


use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::database::lancedb::vector_store::DOCUMENT_TABLE_PREFIX;
use crate::database::{EmbeddingRecord, VectorStore};
use crate::embeddings::{ChunkingConfig, Embedder, chunk_pages, discard_blank_chunks};
use crate::extraction::{ExtractionError, ExtractionPipeline};
use crate::gemini::GeminiClient;
use crate::{AgentError, Result};

pub use chain::{RetrievalChain, format_context};
pub use prompt::{BOOK_AGENT_TEMPLATE, PromptTemplate};
pub use session::Session;

/// Returned instead of an answer when no document has been ingested
pub const UPLOAD_FIRST_MESSAGE: &str = "Please upload a PDF first so I can learn the content.";

/// Single-turn text generation
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;
}

/// Opaque identifier of an ingested document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(Uuid);

impl DocumentHandle {
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Name of the vector table owned by this document
    #[inline]
    pub fn table_name(&self) -> String {
        format!("{DOCUMENT_TABLE_PREFIX}{}", self.0.simple())
    }
}

impl Default for DocumentHandle {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentHandle {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedDocument {
    pub handle: DocumentHandle,
    /// Page records produced by the extraction strategy that won
    pub page_count: usize,
    pub chunk_count: usize,
    /// Name of that strategy
    pub strategy: String,
}

pub struct RagEngine {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
    extractors: ExtractionPipeline,
    chunking: ChunkingConfig,
    template: PromptTemplate,
    top_k: usize,
    temperature: f32,
    chains: RwLock<HashMap<DocumentHandle, Arc<RetrievalChain>>>,
}

impl RagEngine {
    #[inline]
    pub fn new(
        config: &Config,
        store: VectorStore,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
        extractors: ExtractionPipeline,
    ) -> Self {
        Self {
            store: Arc::new(store),
            embedder,
            model,
            extractors,
            chunking: config.chunking.clone(),
            template: PromptTemplate::default(),
            top_k: config.retrieval.top_k,
            temperature: config.gemini.temperature,
            chains: RwLock::new(HashMap::new()),
        }
    }

    /// Engine backed by Gemini, with the index under `server.index_dir`.
    /// Tables left over from a previous run are dropped.
    #[inline]
    pub async fn from_config(config: &Config, api_key: &str) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        let client = Arc::new(GeminiClient::new(&config.gemini, api_key)?);
        let store = VectorStore::open(&config.server.index_dir).await?;
        store.clear_document_tables().await?;

        info!(
            "Engine ready (embedding model {}, chat model {})",
            client.embedding_model(),
            client.chat_model()
        );

        Ok(Self::new(
            config,
            store,
            Arc::clone(&client) as Arc<dyn Embedder>,
            client,
            ExtractionPipeline::from_config(&config.ocr),
        ))
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Extract, chunk, embed and index a PDF, then make it queryable
    #[inline]
    pub async fn ingest(&self, path: &Path) -> Result<IngestedDocument> {
        info!("Processing PDF: {}", path.display());

        let extraction = self.extractors.extract(path).await?;
        let page_count = extraction.pages.len();
        info!(
            "Loaded {} pages using '{}'",
            page_count, extraction.strategy
        );

        let chunks = discard_blank_chunks(chunk_pages(&extraction.pages, &self.chunking));
        if chunks.is_empty() {
            return Err(ExtractionError::NoChunks.into());
        }
        info!("Split into {} chunks", chunks.len());

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(AgentError::Embedding(format!(
                "Expected {} embeddings, received {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let handle = DocumentHandle::new();
        let document_id = handle.to_string();
        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (chunk, vector))| {
                let index = u32::try_from(index).unwrap_or(u32::MAX);
                EmbeddingRecord::from_chunk(&document_id, index, chunk, vector)
            })
            .collect();

        let table_name = handle.table_name();
        if let Err(e) = self.store.create_index(&table_name, &records).await {
            self.discard_table(&table_name).await;
            return Err(e);
        }

        let chain = RetrievalChain::new(
            Arc::clone(&self.store),
            table_name,
            Arc::clone(&self.embedder),
            Arc::clone(&self.model),
            self.template.clone(),
            self.top_k,
            self.temperature,
        );
        self.chains.write().await.insert(handle, Arc::new(chain));

        info!("PDF processed and index created for document {}", handle);
        Ok(IngestedDocument {
            handle,
            page_count,
            chunk_count: records.len(),
            strategy: extraction.strategy,
        })
    }

    /// Answer `question` from the document behind `handle`. Unknown handles
    /// get [`UPLOAD_FIRST_MESSAGE`] rather than an error.
    #[inline]
    pub async fn query(&self, handle: &DocumentHandle, question: &str) -> Result<String> {
        let chain = self.chains.read().await.get(handle).map(Arc::clone);

        match chain {
            Some(chain) => chain.invoke(question).await,
            None => {
                debug!("No chain for document {}", handle);
                Ok(UPLOAD_FIRST_MESSAGE.to_string())
            }
        }
    }

    /// Forget a document and drop its table. Returns whether it was loaded.
    #[inline]
    pub async fn release(&self, handle: &DocumentHandle) -> Result<bool> {
        let removed = self.chains.write().await.remove(handle);

        match removed {
            Some(chain) => {
                self.store.drop_table_if_exists(chain.table_name()).await?;
                info!("Released document {}", handle);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[inline]
    pub async fn is_loaded(&self, handle: &DocumentHandle) -> bool {
        self.chains.read().await.contains_key(handle)
    }

    #[inline]
    pub async fn document_count(&self) -> usize {
        self.chains.read().await.len()
    }

    async fn discard_table(&self, table_name: &str) {
        if let Err(e) = self.store.drop_table_if_exists(table_name).await {
            warn!("Failed to drop half-built table {}: {}", table_name, e);
        }
    }
}
