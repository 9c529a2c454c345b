//! Prediction service HTTP server
//!
//! Loads the model registry once at startup (fatal on failure), then
//! serves tabular predictions and time-series forecasts over HTTP.

use anyhow::{Context, Result};
use predict_lib::{
    health::{components, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger},
    registry::ModelRegistry,
};
use predict_server::{api, config};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting predict-server");

    // Load configuration
    let config = config::ServerConfig::load()?;
    info!(registry_manifest = %config.registry_manifest, "Server configured");

    // Load the model registry; failure here must prevent serving
    let registry = ModelRegistry::load(Path::new(&config.registry_manifest))
        .context("refusing to start without a model registry")?;
    let registry = Arc::new(registry);

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::REGISTRY).await;
    health_registry.register(components::PREDICTOR).await;
    health_registry.register(components::FORECASTER).await;

    // Initialize metrics
    let metrics = ServiceMetrics::new();
    metrics.set_models_loaded(registry.len() as i64);

    // Initialize structured logger
    let logger = StructuredLogger::new("predict-server");
    logger.log_startup(SERVER_VERSION, registry.len());

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(
        registry,
        health_registry.clone(),
        metrics.clone(),
        logger.clone(),
        config.failure_risk_threshold,
    ));

    // Mark service as ready after initialization
    health_registry.set_ready(true).await;

    // Start the API server
    let _api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
