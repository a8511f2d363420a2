//! Upload Orchestrator
//!
//! ```text
//! UploadedArtifact ──► PredictionBackend ──► normalize ──► DetectionStore
//!                                                    └───► ArchiveManager (detached)
//! ```
//!
//! Uploads are processed independently; there is no deduplication, so two
//! identical files uploaded together are both analysed and archived.

use super::archive::{ArchiveManager, ArchiveTicket};
use super::normalize::normalize;
use super::prediction::{PredictionBackend, UploadedArtifact};
use crate::models::{DetectionRecord, DetectionStore};

pub struct Orchestrator {
    backend: PredictionBackend,
    store: DetectionStore,
    archive: ArchiveManager,
}

/// Result of one processed upload
pub struct ProcessedUpload {
    pub record: DetectionRecord,
    pub is_error: bool,
    /// Archival continues in the background; awaiting this is optional
    pub archive: ArchiveTicket,
}

impl Orchestrator {
    pub fn new(backend: PredictionBackend, store: DetectionStore, archive: ArchiveManager) -> Self {
        Self { backend, store, archive }
    }

    pub fn backend(&self) -> &PredictionBackend {
        &self.backend
    }

    pub fn store(&self) -> &DetectionStore {
        &self.store
    }

    pub fn archive(&self) -> &ArchiveManager {
        &self.archive
    }

    /// Predict, normalize, persist, then hand the file to the archive.
    ///
    /// Backend failures are absorbed into the record. A store failure is
    /// returned, but the file is still archived or deleted.
    pub async fn process(&self, artifact: UploadedArtifact) -> Result<ProcessedUpload, sqlx::Error> {
        tracing::info!(
            "📤 Processing file: {} ({:.2} MB) via {} backend",
            artifact.filename,
            artifact.size as f64 / (1024.0 * 1024.0),
            self.backend.name()
        );

        let raw = self.backend.predict(&artifact).await;
        let normalized = normalize(raw, &artifact.filename, artifact.size);
        let is_error = normalized.is_error;

        let saved = self.store.insert(normalized.detection).await;

        let archive = self.archive.archive(artifact.path, &artifact.filename, is_error);

        let record = saved.map_err(|e| {
            tracing::error!("Failed to persist detection for {}: {}", artifact.filename, e);
            e
        })?;

        tracing::info!(
            "✅ Detection {} for {}: {} (entropy {:.3}, confidence {:.2}{})",
            record.id,
            record.filename,
            if record.is_ransomware { "Ransomware" } else { "Safe" },
            record.entropy_score,
            record.confidence,
            if is_error { ", backend error" } else { "" }
        );

        Ok(ProcessedUpload { record, is_error, archive })
    }
}
