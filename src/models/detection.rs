//! Detection model
//!
//! A detection is written once per processed upload and never updated.
//! The store is either PostgreSQL or an in-process list.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// One named, weighted contribution to a classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    #[serde(alias = "feature")]
    pub name: String,
    #[serde(alias = "impact", default)]
    pub importance: f64,
    /// Human readable interpretation, when the backend supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning: Option<String>,
}

impl FeatureImportance {
    pub fn new(name: &str, importance: f64) -> Self {
        Self {
            name: name.to_string(),
            importance,
            meaning: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    #[serde(default)]
    pub features: Vec<FeatureImportance>,
    /// URL of a rendered explanation image
    #[serde(rename = "lime_image", default, skip_serializing_if = "Option::is_none")]
    pub visualization_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRecord {
    pub id: Uuid,
    pub filename: String,
    pub file_size: i64,
    pub is_ransomware: bool,
    pub entropy_score: f64,
    pub hash: String,
    pub confidence: f64,
    pub explanation: Json<Explanation>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A normalized detection awaiting persistence
#[derive(Debug, Clone, PartialEq)]
pub struct NewDetection {
    pub filename: String,
    pub file_size: i64,
    pub is_ransomware: bool,
    pub entropy_score: f64,
    pub hash: String,
    pub confidence: f64,
    pub explanation: Explanation,
}

#[derive(Debug, Deserialize, Default)]
pub struct DetectionFilter {
    pub limit: Option<i64>,
}

impl DetectionRecord {
    pub async fn create(pool: &PgPool, data: NewDetection) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, DetectionRecord>(
            r#"
            INSERT INTO detections (id, filename, file_size, is_ransomware, entropy_score, hash, confidence, explanation)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(&data.filename)
        .bind(data.file_size)
        .bind(data.is_ransomware)
        .bind(data.entropy_score)
        .bind(&data.hash)
        .bind(data.confidence)
        .bind(Json(&data.explanation))
        .fetch_one(pool)
        .await
    }

    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, DetectionRecord>(
            "SELECT * FROM detections ORDER BY created_at DESC LIMIT $1"
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    fn from_new(data: NewDetection) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: data.filename,
            file_size: data.file_size,
            is_ransomware: data.is_ransomware,
            entropy_score: data.entropy_score,
            hash: data.hash,
            confidence: data.confidence,
            explanation: Json(data.explanation),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// RECORD STORE
// ============================================================================

/// Where detections are persisted
#[derive(Clone)]
pub enum DetectionStore {
    Postgres(PgPool),
    Memory(Arc<RwLock<Vec<DetectionRecord>>>),
}

impl DetectionStore {
    pub fn memory() -> Self {
        DetectionStore::Memory(Arc::new(RwLock::new(Vec::new())))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DetectionStore::Postgres(_) => "postgres",
            DetectionStore::Memory(_) => "memory",
        }
    }

    pub async fn insert(&self, data: NewDetection) -> Result<DetectionRecord, sqlx::Error> {
        match self {
            DetectionStore::Postgres(pool) => DetectionRecord::create(pool, data).await,
            DetectionStore::Memory(records) => {
                let record = DetectionRecord::from_new(data);
                records.write().await.push(record.clone());
                Ok(record)
            }
        }
    }

    /// Newest first
    pub async fn recent(&self, limit: i64) -> Result<Vec<DetectionRecord>, sqlx::Error> {
        match self {
            DetectionStore::Postgres(pool) => DetectionRecord::list_recent(pool, limit).await,
            DetectionStore::Memory(records) => {
                let limit = usize::try_from(limit).unwrap_or(0);
                let records = records.read().await;
                Ok(records.iter().rev().take(limit).cloned().collect())
            }
        }
    }
}
