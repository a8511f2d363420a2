//! Prediction Types

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logic::fingerprint;
use crate::models::Explanation;

/// A staged upload, owned by the orchestrator for one request
#[derive(Debug, Clone)]
pub struct UploadedArtifact {
    pub path: PathBuf,
    /// Bytes actually received
    pub size: u64,
    /// Name supplied by the client
    pub filename: String,
}

/// Backend-specific result before normalization.
///
/// Every field is optional; the normalizer fills in defaults. The same shape
/// is what the worker executable prints on stdout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPrediction {
    pub is_ransomware: Option<bool>,
    pub entropy_score: Option<f64>,
    pub hash: Option<String>,
    pub confidence: Option<f64>,
    pub explanation: Option<Explanation>,
    /// Reported by some backends in any numeric form; never trusted
    pub file_size: Option<serde_json::Value>,
    /// Explicit error marker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl RawPrediction {
    /// Degraded result for a failed backend call
    pub fn failed(err: &BackendError) -> Self {
        Self {
            hash: Some(err.sentinel().to_string()),
            error: Some(serde_json::Value::String(err.to_string())),
            ..Default::default()
        }
    }

    /// Whether the result carries a truthy error marker
    pub fn declares_error(&self) -> bool {
        match &self.error {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(serde_json::Value::String(msg)) => !msg.is_empty(),
            Some(_) => true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to read artifact: {0}")]
    Read(String),

    #[error("analysis service unreachable: {0}")]
    Network(String),

    #[error("analysis service timed out")]
    Timeout,

    #[error("analysis service responded with status {0}")]
    Status(u16),

    #[error("unexpected analysis response: {0}")]
    Decode(String),

    #[error("failed to run worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker exited with {0}")]
    Exit(String),

    #[error("worker produced no output")]
    EmptyOutput,

    #[error("worker timed out after {0:?}")]
    WorkerTimeout(Duration),

    #[error("worker output is not a valid result: {0}")]
    Parse(String),
}

impl BackendError {
    /// Fingerprint recorded in place of a digest
    pub fn sentinel(&self) -> &'static str {
        match self {
            BackendError::Read(_) => fingerprint::UNKNOWN,
            BackendError::Network(_) | BackendError::Timeout | BackendError::Status(_) => {
                fingerprint::REMOTE_SERVICE_ERROR
            }
            BackendError::Decode(_) => fingerprint::DECODE_ERROR,
            BackendError::Spawn(_)
            | BackendError::Exit(_)
            | BackendError::EmptyOutput
            | BackendError::WorkerTimeout(_) => fingerprint::WORKER_ERROR,
            BackendError::Parse(_) => fingerprint::PARSE_ERROR,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Network(err.to_string())
        }
    }
}
