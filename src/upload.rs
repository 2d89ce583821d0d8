use std::path::{Path, PathBuf};

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::extract::{self, ExtractionError};
use crate::models::{ErrorResponse, UploadResponse};
use crate::AppState;

const UPLOAD_FIELD: &str = "file";
const DEFAULT_FILENAME: &str = "upload.pdf";
const INDEX_HTML: &str = include_str!("../templates/index.html");

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file provided")]
    MissingFile,
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),
    #[error("{0}")]
    Multipart(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<axum::extract::multipart::MultipartError> for UploadError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        UploadError::Multipart(err.body_text())
    }
}

// ── Staged file guard ────────────────────────────────────────────────────────

/// An uploaded file on disk, removed when the guard is dropped.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
}

impl StagedUpload {
    /// Write `bytes` to `dir/filename`, creating `dir` if needed.
    ///
    /// The guard is armed before the write so a partially written file is
    /// also removed.
    pub async fn write(dir: &Path, filename: &str, bytes: &[u8]) -> Result<Self, UploadError> {
        tokio::fs::create_dir_all(dir).await?;
        let staged = Self {
            path: dir.join(filename),
        };
        tokio::fs::write(&staged.path, bytes).await?;
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Blocking unlink; drop the guard on a blocking thread where possible.
impl Drop for StagedUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("removed staged upload {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("failed to remove {}: {}", self.path.display(), e),
        }
    }
}

/// Keep only the last path component of a client-supplied filename.
pub fn sanitize_filename(raw: &str) -> Result<String, UploadError> {
    let normalized = raw.replace('\\', "/");
    let name = normalized
        .rsplit('/')
        .next()
        .map(str::trim)
        .unwrap_or("");
    if name.is_empty() || name == "." || name == ".." {
        return Err(UploadError::InvalidFilename(raw.to_string()));
    }
    Ok(name.to_string())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Failures are reported in the body; the status is always 200.
pub async fn upload_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let result = match multipart {
        Ok(multipart) => process_upload(&state, multipart).await,
        Err(rejection) => Err(UploadError::Multipart(rejection.body_text())),
    };

    match result {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::warn!("upload failed: {}", e);
            Json(ErrorResponse {
                error: e.to_string(),
            })
            .into_response()
        }
    }
}

async fn process_upload(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<UploadResponse, UploadError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or(DEFAULT_FILENAME).to_string();
        let data = field.bytes().await?;
        upload = Some((filename, data.to_vec()));
    }

    let (filename, data) = upload.ok_or(UploadError::MissingFile)?;
    let stored_name = sanitize_filename(&filename)?;
    tracing::info!("received '{}' ({} bytes)", filename, data.len());

    let staged = StagedUpload::write(&state.upload_dir, &stored_name, &data).await?;

    // The guard is dropped on the blocking thread, not an async worker.
    let extraction = tokio::task::spawn_blocking(move || {
        let result = extract::extract_text_and_images(staged.path());
        drop(staged);
        result
    })
    .await??;
    tracing::info!(
        "extracted {} pages, {} images from '{}'",
        extraction.pages,
        extraction.images_count,
        filename
    );

    let ai_response = state.summarizer.process_with_ai(&extraction.text).await;

    Ok(UploadResponse {
        filename,
        text: extraction.text,
        images_count: extraction.images_count,
        ai_response,
    })
}
