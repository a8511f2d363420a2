//! One-Shield Detection Intake
//!
//! Accepts uploaded Windows executables, scores them through one of the
//! prediction backends, records the outcome and archives the sample.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ONE-SHIELD DETECTION INTAKE                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌─────────────────┐   ┌─────────────────┐  │
//! │  │  Upload   │──►│  Prediction     │──►│  Normalizer     │  │
//! │  │  (Axum)   │   │  sim/remote/    │   │                 │  │
//! │  └───────────┘   │  worker         │   └────────┬────────┘  │
//! │                  └─────────────────┘            ▼           │
//! │            ┌──────────────┐            ┌─────────────────┐  │
//! │            │   Archive    │◄───────────│  Record Store   │  │
//! │            │ success/error│            │  (PostgreSQL)   │  │
//! │            └──────────────┘            └─────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logic;
pub mod models;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use error::{AppError, AppResult};

use config::Config;
use logic::archive::ArchiveManager;
use logic::prediction::PredictionBackend;
use logic::Orchestrator;
use models::DetectionStore;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Wire the pipeline from configuration and an opened record store
    pub fn build(config: Config, store: DetectionStore) -> anyhow::Result<Self> {
        let backend = PredictionBackend::from_mode(&config.prediction)?;
        let archive = ArchiveManager::new(config.archive.clone());
        let orchestrator = Arc::new(Orchestrator::new(backend, store, archive));

        Ok(Self { config, orchestrator })
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    let cors = match state
        .config
        .cors_origin
        .as_deref()
        .and_then(|origin| HeaderValue::from_str(origin).ok())
    {
        Some(origin) => CorsLayer::new().allow_origin(origin).allow_methods(Any).allow_headers(Any),
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/api/health", get(handlers::health::check))
        .route("/api/detection", get(handlers::detection::list))
        .route("/api/detection/upload", post(handlers::detection::upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
