//! Subprocess Worker Backend
//!
//! Runs an external executable with the artifact path as its last argument
//! and reads one JSON result from its stdout. The child is awaited on the
//! async runtime, so a slow worker only holds up its own upload.

use std::process::Stdio;

use tokio::process::Command;

use super::types::{BackendError, RawPrediction, UploadedArtifact};
use crate::config::WorkerSettings;

pub struct WorkerBackend {
    settings: WorkerSettings,
}

impl WorkerBackend {
    pub fn new(settings: WorkerSettings) -> Self {
        Self { settings }
    }

    pub fn program(&self) -> &str {
        &self.settings.program
    }

    pub async fn predict(&self, artifact: &UploadedArtifact) -> Result<RawPrediction, BackendError> {
        let mut command = Command::new(&self.settings.program);
        command
            .args(&self.settings.args)
            .arg(&artifact.path)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let run = command.output();
        let output = match self.settings.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| BackendError::WorkerTimeout(limit))??,
            None => run.await?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            tracing::warn!(
                "Worker failed for {} ({}): {}",
                artifact.filename,
                output.status,
                if stderr.trim().is_empty() { "no stderr" } else { stderr.trim() }
            );
            return Err(BackendError::Exit(output.status.to_string()));
        }

        if !stderr.trim().is_empty() {
            tracing::debug!("Worker stderr for {}: {}", artifact.filename, stderr.trim());
        }

        parse_worker_output(&stdout)
    }
}

/// Parse captured stdout as exactly one prediction object
pub fn parse_worker_output(stdout: &str) -> Result<RawPrediction, BackendError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(BackendError::EmptyOutput);
    }

    serde_json::from_str(trimmed).map_err(|e| BackendError::Parse(e.to_string()))
}
