use actix_multipart::{Field, Multipart};
use actix_web::{HttpResponse, web};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use super::{ApiError, AppState};
use crate::AgentError;

const UPLOAD_FIELD: &str = "file";
const ONLY_PDF_MESSAGE: &str = "Only PDF files are allowed.";

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub pages: usize,
    pub document_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// A PDF written to the upload directory
struct StoredUpload {
    filename: String,
    path: PathBuf,
}

#[inline]
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(StatusResponse {
        message: "AI Book Agent API is running.".to_string(),
    })
}

#[inline]
pub async fn upload(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let stored = receive_pdf(&state, &mut payload).await?;
    info!("Received upload {}", stored.path.display());

    let ingested = state.session.upload(&stored.path).await.map_err(|e| {
        error!("Failed to process {}: {}", stored.filename, e);
        ApiError::from(e)
    })?;

    Ok(HttpResponse::Ok().json(UploadResponse {
        message: upload_message(ingested.page_count),
        filename: stored.filename,
        pages: ingested.page_count,
        document_id: ingested.handle.to_string(),
    }))
}

#[inline]
pub async fn chat(
    state: web::Data<AppState>,
    request: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    debug!("Question received ({} chars)", request.message.len());

    let response = state.session.chat(&request.message).await.map_err(|e| {
        error!("Failed to answer question: {}", e);
        ApiError::from(e)
    })?;

    Ok(HttpResponse::Ok().json(ChatResponse { response }))
}

#[inline]
pub fn upload_message(pages: usize) -> String {
    format!(
        "PDF received! I’m analyzing the entire book right now ({pages} pages). Give me a few seconds and then ask anything you want."
    )
}

/// Whether `filename` ends in a lowercase `.pdf`
#[inline]
#[expect(
    clippy::case_sensitive_file_extension_comparisons,
    reason = "uploads are accepted only with the exact `.pdf` suffix"
)]
pub fn is_pdf_filename(filename: &str) -> bool {
    filename.ends_with(".pdf")
}

/// Final path component of a client-supplied name
fn sanitize_filename(filename: &str) -> Option<String> {
    let normalized = filename.replace('\\', "/");
    Path::new(&normalized)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.trim().is_empty())
}

/// Stream the `file` field to disk after checking its name
async fn receive_pdf(state: &AppState, payload: &mut Multipart) -> Result<StoredUpload, ApiError> {
    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            drain(&mut field).await?;
            continue;
        }

        let original = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or_default()
            .to_string();

        if !is_pdf_filename(&original) {
            warn!("Rejected upload {:?}: not a PDF", original);
            return Err(AgentError::UnsupportedInput(ONLY_PDF_MESSAGE.to_string()).into());
        }

        let filename = sanitize_filename(&original)
            .ok_or_else(|| ApiError::BadRequest("Invalid file name.".to_string()))?;

        let path = state.upload_dir.join(&filename);
        write_field(&mut field, &path, state.max_upload_bytes).await?;

        return Ok(StoredUpload { filename, path });
    }

    Err(ApiError::BadRequest(format!(
        "No file was uploaded. Send the PDF in the '{UPLOAD_FIELD}' form field."
    )))
}

/// Stream `field` into `path`; nothing is left behind if the copy fails
async fn write_field(field: &mut Field, path: &Path, limit: u64) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ApiError::from(AgentError::Io(e)))?;
    }

    let file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ApiError::from(AgentError::Io(e)))?;

    match copy_field(field, file, limit).await {
        Ok(written) => {
            debug!("Wrote {} bytes to {}", written, path.display());
            Ok(())
        }
        Err(e) => {
            if let Err(remove_error) = tokio::fs::remove_file(path).await {
                warn!(
                    "Failed to remove partial upload {}: {}",
                    path.display(),
                    remove_error
                );
            }
            Err(e)
        }
    }
}

async fn copy_field(
    field: &mut Field,
    mut file: tokio::fs::File,
    limit: u64,
) -> Result<u64, ApiError> {
    let mut written: u64 = 0;

    while let Some(bytes) = field.try_next().await.map_err(multipart_error)? {
        written += bytes.len() as u64;
        if written > limit {
            return Err(ApiError::BadRequest(format!(
                "File exceeds the {} MB upload limit.",
                limit / (1024 * 1024)
            )));
        }
        file.write_all(&bytes)
            .await
            .map_err(|e| ApiError::from(AgentError::Io(e)))?;
    }

    file.flush()
        .await
        .map_err(|e| ApiError::from(AgentError::Io(e)))?;
    Ok(written)
}

async fn drain(field: &mut Field) -> Result<(), ApiError> {
    while field.try_next().await.map_err(multipart_error)?.is_some() {}
    Ok(())
}

fn multipart_error(error: actix_multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Invalid multipart payload: {error}"))
}
