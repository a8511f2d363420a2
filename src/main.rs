//! One-Shield Detection Intake Server

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oneshield_detect::{
    config::{self, RecordStoreKind},
    create_router, db,
    models::DetectionStore,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env().context("Invalid configuration")?;

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "oneshield_detect=debug,tower_http=debug".into());
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("One-Shield Detection Intake starting...");

    let store = match config.record_store {
        RecordStoreKind::Postgres => {
            tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

            let pool = db::create_pool(&config.database_url)
                .await
                .context("Failed to create database pool")?;

            tracing::info!("Running database migrations...");
            db::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;

            DetectionStore::Postgres(pool)
        }
        RecordStoreKind::Memory => {
            tracing::warn!("Using in-memory record store; detections are lost on restart");
            DetectionStore::memory()
        }
    };

    // Build application state
    let state = AppState::build(config.clone(), store).context("Failed to build prediction backend")?;

    tracing::info!("🔎 Prediction backend: {}", state.orchestrator.backend().describe());
    tracing::info!("📁 Uploads folder: {}", config.upload_dir.display());
    tracing::info!(
        "📦 Archive: {} (enabled: {}, retention: {} days)",
        config.archive.root.display(),
        config.archive.enabled,
        config.archive.retention_days
    );

    // Retention sweep runs once, off the request path
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        orchestrator.archive().prune_expired().await;
    });

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
