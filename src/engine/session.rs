use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{DocumentHandle, IngestedDocument, RagEngine, UPLOAD_FIRST_MESSAGE};
use crate::Result;

/// At most one active document; each upload replaces the previous one
pub struct Session {
    engine: Arc<RagEngine>,
    active: RwLock<Option<DocumentHandle>>,
}

impl Session {
    #[inline]
    pub fn new(engine: Arc<RagEngine>) -> Self {
        Self {
            engine,
            active: RwLock::new(None),
        }
    }

    #[inline]
    pub fn engine(&self) -> &RagEngine {
        &self.engine
    }

    #[inline]
    pub async fn active_document(&self) -> Option<DocumentHandle> {
        *self.active.read().await
    }

    /// Ingest `path` and make it the active document. The previously active
    /// document is released only after the new one is fully indexed and no
    /// chat is still reading it.
    #[inline]
    pub async fn upload(&self, path: &Path) -> Result<IngestedDocument> {
        let ingested = self.engine.ingest(path).await?;

        let mut active = self.active.write().await;
        if let Some(previous) = active.replace(ingested.handle) {
            info!("Replacing document {} with {}", previous, ingested.handle);
            if let Err(e) = self.engine.release(&previous).await {
                warn!("Failed to release document {}: {}", previous, e);
            }
        }
        drop(active);

        Ok(ingested)
    }

    /// Answer from the active document. The active handle stays pinned
    /// until the answer is produced.
    #[inline]
    pub async fn chat(&self, question: &str) -> Result<String> {
        let active = self.active.read().await;
        match *active {
            Some(handle) => self.engine.query(&handle, question).await,
            None => Ok(UPLOAD_FIRST_MESSAGE.to_string()),
        }
    }
}
