//! Sample Archive
//!
//! Processed uploads are moved out of the staging directory into
//! `<root>/success` or `<root>/error`. Every upload ends up either relocated
//! or deleted:
//!
//! 1. Try an atomic rename into the partition
//! 2. On failure, retry after a fixed delay, up to the configured bound
//! 3. When retries run out (or the task is cancelled), delete the source
//!
//! Each operation runs as its own background task and reports its terminal
//! state through an [`ArchiveTicket`].

pub mod retention;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ArchiveSettings;

pub use retention::PruneReport;

/// NAME_MAX on common filesystems
pub const MAX_FILE_NAME_BYTES: usize = 255;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Success,
    Error,
}

impl Partition {
    pub fn for_outcome(is_error: bool) -> Self {
        if is_error {
            Partition::Error
        } else {
            Partition::Success
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            Partition::Success => "success",
            Partition::Error => "error",
        }
    }
}

/// Terminal state of one archive operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Moved to this path
    Relocated(PathBuf),
    /// Removed from staging without archiving
    Deleted,
    /// Neither rename nor delete succeeded
    Failed,
}

/// Handle to a scheduled archive operation
pub struct ArchiveTicket {
    outcome: oneshot::Receiver<ArchiveOutcome>,
    cancel: CancellationToken,
}

impl ArchiveTicket {
    /// Stop retrying and fall through to deletion
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the terminal state
    pub async fn outcome(self) -> ArchiveOutcome {
        // Sender only vanishes if the runtime dropped the task
        self.outcome.await.unwrap_or(ArchiveOutcome::Failed)
    }
}

// ============================================================================
// MANAGER
// ============================================================================

#[derive(Debug, Clone)]
pub struct ArchiveManager {
    settings: ArchiveSettings,
}

impl ArchiveManager {
    pub fn new(settings: ArchiveSettings) -> Self {
        Self { settings }
    }

    pub fn root(&self) -> &Path {
        &self.settings.root
    }

    pub fn partition_dir(&self, partition: Partition) -> PathBuf {
        self.settings.root.join(partition.dir_name())
    }

    /// Timestamp-prefixed destination for an upload, at most
    /// [`MAX_FILE_NAME_BYTES`] long
    pub fn destination_for(&self, partition: Partition, original_name: &str) -> PathBuf {
        let short_id = Uuid::new_v4().simple().to_string();
        let prefix = format!("{}-{}-", Utc::now().timestamp_millis(), &short_id[..8]);
        let budget = MAX_FILE_NAME_BYTES.saturating_sub(prefix.len());
        let name = format!("{}{}", prefix, fit_file_name(&safe_file_name(original_name), budget));
        self.partition_dir(partition).join(name)
    }

    /// Schedule relocation of a processed upload. Must be called from
    /// within a Tokio runtime.
    pub fn archive(&self, source: PathBuf, original_name: &str, is_error: bool) -> ArchiveTicket {
        let partition = Partition::for_outcome(is_error);
        let task = ArchiveTask {
            destination: self.destination_for(partition, original_name),
            source,
            enabled: self.settings.enabled,
            retries: self.settings.retry_attempts,
            delay: self.settings.retry_delay,
        };

        let (tx, rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let outcome = task.run(token).await;
            // Nobody may be listening; the outcome is already logged
            let _ = tx.send(outcome);
        });

        ArchiveTicket { outcome: rx, cancel }
    }

    /// Delete archived files older than the retention window
    pub async fn prune_expired(&self) -> PruneReport {
        retention::prune_expired(
            &self.settings.root,
            self.settings.retention(),
            self.settings.prune_workers,
        )
        .await
    }
}

// ============================================================================
// TASK
// ============================================================================

struct ArchiveTask {
    source: PathBuf,
    destination: PathBuf,
    enabled: bool,
    retries: u32,
    delay: Duration,
}

impl ArchiveTask {
    async fn run(self, cancel: CancellationToken) -> ArchiveOutcome {
        if !self.enabled {
            return delete_fallback(&self.source).await;
        }

        if let Some(parent) = self.destination.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!("Failed to create archive dir {}: {}", parent.display(), e);
            }
        }

        let mut tries = 0u32;
        loop {
            match tokio::fs::rename(&self.source, &self.destination).await {
                Ok(()) => {
                    tracing::info!("📦 File archived to {}", self.destination.display());
                    return ArchiveOutcome::Relocated(self.destination);
                }
                Err(e) => {
                    tries += 1;
                    if tries > self.retries {
                        tracing::error!(
                            "Archive failed after {} attempts for {}: {}",
                            tries,
                            self.source.display(),
                            e
                        );
                        break;
                    }

                    tracing::warn!(
                        "Archive attempt {} failed: {}. retrying in {:?}",
                        tries,
                        e,
                        self.delay
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::warn!("Archive of {} cancelled", self.source.display());
                            break;
                        }
                        _ = tokio::time::sleep(self.delay) => {}
                    }
                }
            }
        }

        delete_fallback(&self.source).await
    }
}

async fn delete_fallback(source: &Path) -> ArchiveOutcome {
    match tokio::fs::remove_file(source).await {
        Ok(()) => {
            tracing::info!("🗑️ Deleted {} instead of archiving", source.display());
            ArchiveOutcome::Deleted
        }
        Err(e) => {
            tracing::error!("Fallback delete also failed for {}: {}", source.display(), e);
            ArchiveOutcome::Failed
        }
    }
}

/// Shorten a name to `budget` bytes on a char boundary, keeping a short
/// extension when there is one
fn fit_file_name(name: &str, budget: usize) -> String {
    if name.len() <= budget {
        return name.to_string();
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= budget / 2 => name.split_at(dot),
        _ => (name, ""),
    };

    let mut end = budget - extension.len();
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &stem[..end], extension)
}

/// Last path component of a client-supplied name, never empty
fn safe_file_name(original: &str) -> String {
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        "upload".to_string()
    } else {
        name.to_string()
    }
}
