//! Remote Forward Backend
//!
//! Streams the artifact to an external analysis service as multipart
//! `file` and decodes its JSON answer. Field names vary between service
//! versions, so each value is taken from the first alias that is present.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use super::types::{BackendError, RawPrediction, UploadedArtifact};
use crate::config::RemoteSettings;
use crate::models::{Explanation, FeatureImportance};

/// Fixed path appended to the configured base URL
pub const ANALYZE_PATH: &str = "/analyze";

/// Label the service uses for a positive classification
const POSITIVE_LABEL: &str = "Ransomware";

pub struct RemoteBackend {
    endpoint: String,
    http_client: reqwest::Client,
}

/// Shape of the analysis service response
#[derive(Debug, Deserialize)]
struct RemoteAnalysis {
    label: Option<String>,
    #[serde(rename = "entropyScore")]
    entropy_score: Option<f64>,
    file_entropy: Option<f64>,
    sha256: Option<String>,
    hash: Option<String>,
    /// Only honoured when numeric
    prob: Option<serde_json::Value>,
    confidence: Option<f64>,
    top_features: Option<Vec<FeatureImportance>>,
    explanation: Option<Explanation>,
    lime_image: Option<String>,
    error: Option<serde_json::Value>,
}

impl RemoteBackend {
    pub fn new(settings: &RemoteSettings) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            endpoint: format!("{}{}", settings.base_url, ANALYZE_PATH),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn predict(&self, artifact: &UploadedArtifact) -> Result<RawPrediction, BackendError> {
        let file = tokio::fs::File::open(&artifact.path)
            .await
            .map_err(|e| BackendError::Read(e.to_string()))?;

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, artifact.size)
            .file_name(artifact.filename.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);

        tracing::info!("Forwarding {} to {}", artifact.filename, self.endpoint);

        let response = self.http_client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        decode_analysis(&body)
    }
}

/// Validate and map a service response body
fn decode_analysis(body: &[u8]) -> Result<RawPrediction, BackendError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| BackendError::Decode(e.to_string()))?;

    if !value.is_object() {
        return Err(BackendError::Decode("response is not a JSON object".to_string()));
    }

    let analysis: RemoteAnalysis = serde_json::from_value(value)
        .map_err(|e| BackendError::Decode(e.to_string()))?;

    let label = analysis.label
        .ok_or_else(|| BackendError::Decode("missing field `label`".to_string()))?;

    let confidence = match analysis.prob.as_ref().and_then(|p| p.as_f64()) {
        Some(prob) => Some(prob),
        None => analysis.confidence,
    };

    let mut explanation = match analysis.top_features {
        Some(features) => Explanation { features, visualization_url: None },
        None => analysis.explanation.unwrap_or_default(),
    };
    explanation.visualization_url = analysis.lime_image;

    Ok(RawPrediction {
        is_ransomware: Some(label == POSITIVE_LABEL),
        entropy_score: analysis.entropy_score.or(analysis.file_entropy),
        hash: non_empty(analysis.sha256).or_else(|| non_empty(analysis.hash)),
        confidence,
        explanation: Some(explanation),
        file_size: None,
        error: analysis.error,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
