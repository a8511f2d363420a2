//! Prediction Backends
//!
//! Exactly one backend is active per process, chosen from configuration at
//! startup. A backend failure never fails the request: it is turned into a
//! degraded [`RawPrediction`] carrying a sentinel fingerprint.

pub mod types;
pub mod simulated;
pub mod remote;
pub mod worker;

pub use types::*;
pub use simulated::SimulatedBackend;
pub use remote::RemoteBackend;
pub use worker::WorkerBackend;

use crate::config::PredictionMode;

pub enum PredictionBackend {
    Simulated(SimulatedBackend),
    Remote(RemoteBackend),
    Worker(WorkerBackend),
}

impl PredictionBackend {
    /// Build the backend selected by configuration
    pub fn from_mode(mode: &PredictionMode) -> Result<Self, reqwest::Error> {
        Ok(match mode {
            PredictionMode::Simulated(settings) => {
                PredictionBackend::Simulated(SimulatedBackend::new(settings.clone()))
            }
            PredictionMode::Remote(settings) => PredictionBackend::Remote(RemoteBackend::new(settings)?),
            PredictionMode::Worker(settings) => PredictionBackend::Worker(WorkerBackend::new(settings.clone())),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            PredictionBackend::Simulated(_) => "simulated",
            PredictionBackend::Remote(_) => "remote",
            PredictionBackend::Worker(_) => "worker",
        }
    }

    /// Human readable target, for startup logs
    pub fn describe(&self) -> String {
        match self {
            PredictionBackend::Simulated(_) => "simulated (demo only, not a detector)".to_string(),
            PredictionBackend::Remote(remote) => format!("remote service at {}", remote.endpoint()),
            PredictionBackend::Worker(worker) => format!("worker process '{}'", worker.program()),
        }
    }

    /// Run one prediction; failures degrade to a sentinel result
    pub async fn predict(&self, artifact: &UploadedArtifact) -> RawPrediction {
        let result = match self {
            PredictionBackend::Simulated(backend) => backend.predict(artifact).await,
            PredictionBackend::Remote(backend) => backend.predict(artifact).await,
            PredictionBackend::Worker(backend) => backend.predict(artifact).await,
        };

        match result {
            Ok(prediction) => prediction,
            Err(e) => {
                tracing::warn!(
                    "{} backend degraded for {}: {} (recorded as '{}')",
                    self.name(),
                    artifact.filename,
                    e,
                    e.sentinel()
                );
                RawPrediction::failed(&e)
            }
        }
    }
}
