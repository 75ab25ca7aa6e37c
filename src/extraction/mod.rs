// Extraction module
// Ordered PDF-to-text strategies; the text layer is tried before OCR

pub mod ocr;
pub mod pdf_text;


use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::OcrConfig;

pub use ocr::OcrExtractor;
pub use pdf_text::PdfTextExtractor;

/// Text of a single page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Zero-based page index
    pub page: u32,
    pub text: String,
    /// Path of the file the page was read from
    pub source: String,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("No content could be extracted from the PDF.")]
    NoContent,

    #[error("No valid text content found in the PDF after splitting.")]
    NoChunks,

    #[error("OCR dependency missing: {tool}. {hint}")]
    MissingDependency { tool: String, hint: String },

    #[error("Failed to convert PDF to images. Make sure Poppler is installed. Error: {0}")]
    Rasterization(String),

    #[error("OCR failed on page {page}: {message}")]
    Recognition { page: u32, message: String },

    #[error("Failed to read PDF: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A way of turning a PDF into per-page text
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    async fn extract(&self, path: &Path) -> Result<Vec<PageRecord>, ExtractionError>;
}

/// Pages produced by the strategy that won
#[derive(Debug, Clone)]
pub struct Extraction {
    pub pages: Vec<PageRecord>,
    pub strategy: String,
}

pub struct ExtractionPipeline {
    strategies: Vec<Arc<dyn TextExtractor>>,
    min_text_chars: usize,
}

impl ExtractionPipeline {
    #[inline]
    pub fn new(min_text_chars: usize) -> Self {
        Self {
            strategies: Vec::new(),
            min_text_chars,
        }
    }

    /// Text layer first, then OCR
    #[inline]
    pub fn from_config(ocr: &OcrConfig) -> Self {
        Self::new(ocr.min_text_chars)
            .with_strategy(PdfTextExtractor::new())
            .with_strategy(OcrExtractor::new(ocr.clone()))
    }

    #[inline]
    #[must_use]
    pub fn with_strategy<E: TextExtractor + 'static>(self, extractor: E) -> Self {
        self.with_shared_strategy(Arc::new(extractor))
    }

    #[inline]
    #[must_use]
    pub fn with_shared_strategy(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.strategies.push(extractor);
        self
    }

    #[inline]
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    #[inline]
    pub fn min_text_chars(&self) -> usize {
        self.min_text_chars
    }

    /// Run the strategies in order until one yields usable text
    #[inline]
    pub async fn extract(&self, path: &Path) -> Result<Extraction, ExtractionError> {
        let mut last_error = None;
        let last_position = self.strategies.len().saturating_sub(1);

        for (position, strategy) in self.strategies.iter().enumerate() {
            debug!("Trying extractor '{}' on {}", strategy.name(), path.display());

            let pages = match strategy.extract(path).await {
                Ok(pages) => pages,
                Err(e) => {
                    warn!("Extractor '{}' failed: {}", strategy.name(), e);
                    last_error = Some(e);
                    continue;
                }
            };

            info!(
                "Extractor '{}' loaded {} pages from PDF",
                strategy.name(),
                pages.len()
            );

            if position == last_position {
                if pages.is_empty() {
                    return Err(ExtractionError::NoContent);
                }
                return Ok(Extraction {
                    pages,
                    strategy: strategy.name().to_string(),
                });
            }

            let found = text_length(&pages);
            if found >= self.min_text_chars {
                return Ok(Extraction {
                    pages,
                    strategy: strategy.name().to_string(),
                });
            }

            info!(
                "Only found {} characters with '{}'. PDF may be scanned.",
                found,
                strategy.name()
            );
            last_error = None;
        }

        Err(last_error.unwrap_or(ExtractionError::NoContent))
    }
}

/// Length in characters of all page text joined together and trimmed
#[inline]
pub fn text_length(pages: &[PageRecord]) -> usize {
    let joined: String = pages.iter().map(|page| page.text.as_str()).collect();
    joined.trim().chars().count()
}
