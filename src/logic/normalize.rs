//! Result Normalization
//!
//! Coalesces a backend result into the canonical detection shape. The file
//! size always comes from the ingestion side; whatever the backend reports
//! is dropped.

use super::entropy::MAX_ENTROPY;
use super::fingerprint;
use super::prediction::RawPrediction;
use crate::models::NewDetection;

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub detection: NewDetection,
    /// Routes the archive partition; not persisted
    pub is_error: bool,
}

pub fn normalize(raw: RawPrediction, filename: &str, file_size: u64) -> Normalized {
    let is_error_marked = raw.declares_error();

    let hash = raw
        .hash
        .as_deref()
        .map(fingerprint::canonicalize)
        .unwrap_or_else(|| fingerprint::UNKNOWN.to_string());

    let is_error = is_error_marked || fingerprint::is_failure_sentinel(&hash);

    let detection = NewDetection {
        filename: filename.to_string(),
        file_size: i64::try_from(file_size).unwrap_or(i64::MAX),
        is_ransomware: raw.is_ransomware.unwrap_or(false),
        entropy_score: bounded(raw.entropy_score, MAX_ENTROPY),
        hash,
        confidence: bounded(raw.confidence, 1.0),
        explanation: raw.explanation.unwrap_or_default(),
    };

    Normalized { detection, is_error }
}

/// Clamp into [0, max]; absent or non-finite values become 0
fn bounded(value: Option<f64>, max: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, max),
        _ => 0.0,
    }
}
