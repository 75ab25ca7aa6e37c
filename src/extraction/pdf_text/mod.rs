
use async_trait::async_trait;
use lopdf::Document;
use std::path::Path;
use tracing::{debug, trace};

use super::{ExtractionError, PageRecord, TextExtractor};

/// Reads the embedded text layer of a PDF
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    fn name(&self) -> &str {
        "pdf-text"
    }

    async fn extract(&self, path: &Path) -> Result<Vec<PageRecord>, ExtractionError> {
        debug!("Reading text layer from {}", path.display());

        let bytes = tokio::fs::read(path).await?;
        let source = path.display().to_string();

        tokio::task::spawn_blocking(move || extract_pages(&bytes, &source))
            .await
            .map_err(|e| ExtractionError::Parse(format!("Task join error: {e}")))?
    }
}

/// One record per page, in page order, including pages without text
fn extract_pages(bytes: &[u8], source: &str) -> Result<Vec<PageRecord>, ExtractionError> {
    let document = Document::load_mem(bytes).map_err(|e| ExtractionError::Parse(e.to_string()))?;
    let pages = document.get_pages();
    let mut records = Vec::with_capacity(pages.len());

    for &page_number in pages.keys() {
        let text = document.extract_text(&[page_number]).unwrap_or_else(|e| {
            trace!("No text layer on page {}: {}", page_number, e);
            String::new()
        });

        records.push(PageRecord {
            page: page_number.saturating_sub(1),
            text,
            source: source.to_string(),
        });
    }

    Ok(records)
}
