// OCR module
// Rasterizes pages with pdftoppm and reads them back with tesseract


use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

use super::{ExtractionError, PageRecord, TextExtractor};
use crate::config::OcrConfig;

const IMAGE_PREFIX: &str = "page";

const TESSERACT_HINT: &str = "Install Tesseract OCR (e.g. `apt install tesseract-ocr` or `brew install tesseract`) or set ocr.tesseract_cmd.";
const PDFTOPPM_HINT: &str = "Install Poppler (e.g. `apt install poppler-utils` or `brew install poppler`) or set ocr.pdftoppm_cmd.";

#[derive(Debug, Clone)]
pub struct OcrExtractor {
    config: OcrConfig,
}

impl OcrExtractor {
    #[inline]
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Fail early with an actionable message if either tool is absent
    #[inline]
    pub async fn ensure_available(&self) -> Result<(), ExtractionError> {
        check_tool(&self.config.tesseract_cmd, "--version", TESSERACT_HINT).await?;
        check_tool(&self.config.pdftoppm_cmd, "-v", PDFTOPPM_HINT).await?;
        Ok(())
    }

    async fn rasterize(&self, pdf: &Path, workdir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
        let output = Command::new(&self.config.pdftoppm_cmd)
            .arg("-r")
            .arg(self.config.dpi.to_string())
            .arg("-png")
            .arg(pdf)
            .arg(workdir.join(IMAGE_PREFIX))
            .output()
            .await
            .map_err(|e| spawn_error(&self.config.pdftoppm_cmd, PDFTOPPM_HINT, &e))?;

        if !output.status.success() {
            return Err(ExtractionError::Rasterization(stderr_message(&output)));
        }

        let images = collect_page_images(workdir)?;
        if images.is_empty() {
            return Err(ExtractionError::Rasterization(
                "no page images were produced".to_string(),
            ));
        }

        debug!("Rasterized {} pages at {} DPI", images.len(), self.config.dpi);
        Ok(images)
    }

    async fn recognize(&self, image: &Path, page: u32) -> Result<String, ExtractionError> {
        let output = Command::new(&self.config.tesseract_cmd)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .output()
            .await
            .map_err(|e| spawn_error(&self.config.tesseract_cmd, TESSERACT_HINT, &e))?;

        if !output.status.success() {
            return Err(ExtractionError::Recognition {
                page,
                message: stderr_message(&output),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TextExtractor for OcrExtractor {
    fn name(&self) -> &str {
        "ocr"
    }

    async fn extract(&self, path: &Path) -> Result<Vec<PageRecord>, ExtractionError> {
        self.ensure_available().await?;
        info!("PDF appears to be scanned. Using OCR to extract text...");

        let workdir = tempfile::tempdir()?;
        let images = self.rasterize(path, workdir.path()).await?;
        let source = path.display().to_string();
        let mut records = Vec::new();

        for (index, image) in images.iter().enumerate() {
            let page = u32::try_from(index).unwrap_or(u32::MAX);
            info!("Processing page {}/{} with OCR...", index + 1, images.len());

            let text = self.recognize(image, page).await?;
            if text.trim().is_empty() {
                debug!("OCR found no text on page {}", page);
                continue;
            }

            records.push(PageRecord {
                page,
                text,
                source: source.clone(),
            });
        }

        info!("OCR extracted text from {} pages", records.len());
        Ok(records)
    }
}

async fn check_tool(command: &str, version_flag: &str, hint: &str) -> Result<(), ExtractionError> {
    Command::new(command)
        .arg(version_flag)
        .output()
        .await
        .map(|_| ())
        .map_err(|e| spawn_error(command, hint, &e))
}

fn spawn_error(command: &str, hint: &str, error: &std::io::Error) -> ExtractionError {
    if error.kind() == ErrorKind::NotFound {
        ExtractionError::MissingDependency {
            tool: command.to_string(),
            hint: hint.to_string(),
        }
    } else {
        ExtractionError::MissingDependency {
            tool: command.to_string(),
            hint: format!("could not be started ({error}). {hint}"),
        }
    }
}

fn stderr_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    }
}

/// Rasterized page images in `dir`, ordered by page number
fn collect_page_images(dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut numbered = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_png = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if !is_png {
            continue;
        }
        if let Some(number) = page_number(&path) {
            numbered.push((number, path));
        }
    }

    numbered.sort_by_key(|(number, _)| *number);
    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}

/// `page-07.png` -> 7
fn page_number(image: &Path) -> Option<u32> {
    image
        .file_stem()?
        .to_str()?
        .rsplit('-')
        .next()?
        .parse()
        .ok()
}
