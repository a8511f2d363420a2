//! Simulated Backend
//!
//! DEMO ONLY. This is not a detector. It computes the real entropy signature
//! and SHA-256 of the upload, then fabricates a classification, confidence
//! and explanation from them with random noise so the rest of the pipeline
//! can be exercised without a model. Only its contractual bounds are
//! meaningful; the random parts carry no signal.

use rand::Rng;

use super::types::{BackendError, RawPrediction, UploadedArtifact};
use crate::config::{SimulatedSettings, DEFAULT_MAX_UPLOAD_BYTES};
use crate::logic::{entropy, fingerprint};
use crate::models::{Explanation, FeatureImportance};

/// Signature above which a file is always flagged
pub const HIGH_ENTROPY_THRESHOLD: f64 = 7.0;

pub struct SimulatedBackend {
    settings: SimulatedSettings,
}

impl SimulatedBackend {
    pub fn new(settings: SimulatedSettings) -> Self {
        Self { settings }
    }

    pub async fn predict(&self, artifact: &UploadedArtifact) -> Result<RawPrediction, BackendError> {
        let path = artifact.path.clone();

        // Both passes are sequential blocking reads; keep them off the runtime
        let (signature, digest) = tokio::task::spawn_blocking(move || {
            let signature = entropy::signature_of_file(&path)?;
            let digest = fingerprint::sha256_file(&path)?;
            Ok::<_, std::io::Error>((signature, digest))
        })
        .await
        .map_err(|e| BackendError::Read(e.to_string()))?
        .map_err(|e| BackendError::Read(e.to_string()))?;

        let prediction = self.synthesize(signature, digest, artifact.size);
        tracing::debug!(
            "Simulated prediction for {}: entropy={:.3} flagged={:?}",
            artifact.filename,
            signature,
            prediction.is_ransomware
        );
        Ok(prediction)
    }

    fn synthesize(&self, signature: f64, digest: String, size: u64) -> RawPrediction {
        let mut rng = rand::thread_rng();

        let is_ransomware = signature > HIGH_ENTROPY_THRESHOLD
            || rng.gen_bool(self.settings.positive_rate);

        let base = (signature / entropy::MAX_ENTROPY).min(1.0);
        let confidence = (base + rng.gen::<f64>() * self.settings.confidence_jitter).min(1.0);

        let features = vec![
            FeatureImportance::new("Entropy Score", base * 100.0),
            FeatureImportance::new("Hash Mismatch", rng.gen::<f64>() * 50.0 + 20.0),
            FeatureImportance::new(
                "File Size Patterns",
                size as f64 / DEFAULT_MAX_UPLOAD_BYTES as f64 * 30.0,
            ),
        ];

        RawPrediction {
            is_ransomware: Some(is_ransomware),
            entropy_score: Some(signature),
            hash: Some(digest),
            confidence: Some(confidence),
            explanation: Some(Explanation {
                features,
                visualization_url: None,
            }),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> SimulatedBackend {
        SimulatedBackend::new(SimulatedSettings {
            positive_rate: 0.0,
            confidence_jitter: 0.2,
        })
    }

    fn stage(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> UploadedArtifact {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        UploadedArtifact {
            path,
            size: content.len() as u64,
            filename: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_zero_file_stays_within_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = stage(&dir, "zeros.exe", &[0u8; 1024]);

        let raw = quiet().predict(&artifact).await.unwrap();

        assert_eq!(raw.entropy_score, Some(0.0));
        assert_eq!(raw.is_ransomware, Some(false));
        let confidence = raw.confidence.unwrap();
        assert!((0.0..=0.2).contains(&confidence));
        assert!(fingerprint::is_hex_digest(raw.hash.as_deref().unwrap()));
        assert_eq!(raw.explanation.unwrap().features.len(), 3);
    }

    #[tokio::test]
    async fn test_high_entropy_is_always_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let content: Vec<u8> = (0..256 * 16).map(|i| (i % 256) as u8).collect();
        let artifact = stage(&dir, "packed.exe", &content);

        let raw = quiet().predict(&artifact).await.unwrap();

        assert_eq!(raw.is_ransomware, Some(true));
        assert!(raw.confidence.unwrap() <= 1.0);
    }

    #[tokio::test]
    async fn test_missing_file_is_a_read_error() {
        let artifact = UploadedArtifact {
            path: "/nonexistent/oneshield/sample.exe".into(),
            size: 0,
            filename: "sample.exe".to_string(),
        };

        let err = quiet().predict(&artifact).await.unwrap_err();
        assert!(matches!(err, BackendError::Read(_)));
    }
}
