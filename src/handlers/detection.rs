//! Detection handlers

use std::path::{Path, PathBuf};

use axum::{
    extract::{multipart::Field, Multipart, Query, State},
    Json,
};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{AppState, AppError, AppResult};
use crate::logic::prediction::UploadedArtifact;
use crate::models::{DetectionFilter, DetectionRecord};

/// Multipart field carrying the upload
pub const UPLOAD_FIELD: &str = "file";

/// Accepted extensions, lowercase
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["exe", "msi"];

const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Upload a sample and return its detection record
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<DetectionRecord>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::ValidationError(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::ValidationError("No file uploaded or invalid file type".to_string()))?;

        let extension = allowed_extension(&filename)
            .ok_or_else(|| AppError::ValidationError("Only .exe and .msi files are allowed".to_string()))?;

        let artifact = stage_upload(&state, field, filename, extension).await?;

        // Detached so a dropped request cannot strand the staged file
        let orchestrator = state.orchestrator.clone();
        let processed = tokio::spawn(async move { orchestrator.process(artifact).await })
            .await
            .map_err(|e| AppError::InternalError(format!("Upload processing aborted: {}", e)))??;

        return Ok(Json(processed.record));
    }

    Err(AppError::ValidationError("No file uploaded or invalid file type".to_string()))
}

/// Recent detections, newest first
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<DetectionFilter>,
) -> AppResult<Json<Vec<DetectionRecord>>> {
    let limit = filter.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, DEFAULT_HISTORY_LIMIT);
    let detections = state.orchestrator.store().recent(limit).await?;
    Ok(Json(detections))
}

// Helper functions

/// Lowercase extension if it is one we accept
pub fn allowed_extension(filename: &str) -> Option<&'static str> {
    let extension = Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();

    ALLOWED_EXTENSIONS.iter().copied().find(|allowed| *allowed == extension)
}

/// Stream a multipart field to the staging directory, enforcing the size cap
async fn stage_upload(
    state: &AppState,
    mut field: Field<'_>,
    filename: String,
    extension: &str,
) -> AppResult<UploadedArtifact> {
    let staging_dir = &state.config.upload_dir;
    tokio::fs::create_dir_all(staging_dir).await?;

    let path = staging_path(staging_dir, extension);
    let mut file = tokio::fs::File::create(&path).await?;
    let guard = StagingGuard::new(path);
    let limit = state.config.max_upload_bytes;

    let written: AppResult<u64> = async {
        let mut size = 0u64;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::ValidationError(format!("Upload interrupted: {}", e)))?
        {
            size += chunk.len() as u64;
            if size > limit {
                return Err(AppError::PayloadTooLarge(format!(
                    "File exceeds the {} byte upload limit",
                    limit
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(size)
    }
    .await;
    drop(file);

    let size = written?;
    Ok(UploadedArtifact { path: guard.keep(), size, filename })
}

/// Removes a partially staged upload unless it is handed on
struct StagingGuard {
    path: Option<PathBuf>,
}

impl StagingGuard {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn keep(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to discard partial upload {}: {}", path.display(), e);
            }
        }
    }
}

fn staging_path(dir: &Path, extension: &str) -> PathBuf {
    dir.join(format!(
        "{}-{}.{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        extension
    ))
}
