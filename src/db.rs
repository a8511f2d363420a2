//! Database module - PostgreSQL connection and migrations

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // One statement per call; prepared statements reject batches
    for statement in SCHEMA_SQL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Detections (one per processed upload, never updated)
CREATE TABLE IF NOT EXISTS detections (
    id UUID PRIMARY KEY,
    filename VARCHAR(1024) NOT NULL,
    file_size BIGINT NOT NULL,
    is_ransomware BOOLEAN NOT NULL,
    entropy_score DOUBLE PRECISION NOT NULL DEFAULT 0,
    hash VARCHAR(128) NOT NULL DEFAULT 'unknown',
    confidence DOUBLE PRECISION NOT NULL DEFAULT 0,
    explanation JSONB NOT NULL DEFAULT '{"features": []}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT detections_confidence_range CHECK (confidence >= 0 AND confidence <= 1),
    CONSTRAINT detections_entropy_range CHECK (entropy_score >= 0 AND entropy_score <= 8)
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_detections_created ON detections(created_at DESC)
"#;
