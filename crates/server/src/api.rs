//! HTTP API: prediction endpoints, forecasts, health checks and metrics

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use predict_lib::{
    dispatch,
    forecast::{self, ForecastConfig, ForecastPoint, ObservationRecord},
    health::{ComponentStatus, HealthRegistry},
    models::{PredictionRequest, PredictionResponse},
    observability::{ServiceMetrics, StructuredLogger},
    reconcile,
    registry::ModelRegistry,
    PredictionError,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
    /// Configured override for the equipment failure-risk threshold
    pub failure_threshold: Option<f64>,
}

impl AppState {
    pub fn new(
        registry: Arc<ModelRegistry>,
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
        failure_threshold: Option<f64>,
    ) -> Self {
        Self {
            registry,
            health_registry,
            metrics,
            logger,
            failure_threshold,
        }
    }
}

/// Taxonomy errors rendered as `{error, details?}` with a status code
/// the caller can branch on.
struct ApiError(PredictionError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PredictionError::ModelNotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self.0.to_body())).into_response()
    }
}

/// Tabular prediction: `{model, data}` in, one typed response out
async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let start = Instant::now();
    let result = run_predict(&state, &body);
    state
        .metrics
        .observe_prediction_latency(start.elapsed().as_secs_f64());

    match result {
        Ok(response) => {
            let model_type = type_label(&response);
            state.metrics.inc_predictions_served(model_type);
            state.logger.log_prediction(
                response.model(),
                model_type,
                start.elapsed().as_micros() as u64,
            );
            Json(response).into_response()
        }
        Err(err) => {
            state.metrics.inc_prediction_errors(err.kind());
            state
                .logger
                .log_request_failure("predict", &err.to_string());
            ApiError(err).into_response()
        }
    }
}

fn run_predict(state: &AppState, body: &[u8]) -> Result<PredictionResponse, PredictionError> {
    let request: PredictionRequest = serde_json::from_slice(body)
        .map_err(|e| PredictionError::InvalidInput(e.to_string()))?;
    let bundle = state.registry.resolve(&request.model)?;
    let features = reconcile::reconcile(&bundle.required_features, &request.data);
    dispatch::predict(bundle, &features)
}

fn type_label(response: &PredictionResponse) -> &'static str {
    match response {
        PredictionResponse::Regression { .. } => "regression",
        PredictionResponse::Classification { .. } => "classification",
        PredictionResponse::Clustering { .. } => "clustering",
    }
}

/// Maintenance collection forecast: 3 monthly periods with bounds
async fn forecast_maintenance(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    run_forecast(state, body, "maintenance", ForecastConfig::maintenance()).await
}

/// Equipment failure forecast: 7 daily periods with risk flags
async fn forecast_equipment_failure(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let config = ForecastConfig::equipment_failure(state.failure_threshold);
    run_forecast(state, body, "equipment_failure", config).await
}

async fn run_forecast(
    state: Arc<AppState>,
    body: Bytes,
    pipeline: &'static str,
    config: ForecastConfig,
) -> Response {
    let start = Instant::now();
    let result = run_forecast_inner(&body, config).await;
    state
        .metrics
        .observe_forecast_latency(start.elapsed().as_secs_f64());

    match result {
        Ok((observations, points)) => {
            state.metrics.inc_forecasts_served(pipeline);
            state.logger.log_forecast(
                pipeline,
                observations,
                points.len(),
                start.elapsed().as_micros() as u64,
            );
            Json(points).into_response()
        }
        Err(err) => {
            state.metrics.inc_forecast_errors(pipeline);
            state
                .logger
                .log_request_failure(pipeline, &err.to_string());
            ApiError(err).into_response()
        }
    }
}

async fn run_forecast_inner(
    body: &[u8],
    config: ForecastConfig,
) -> Result<(usize, Vec<ForecastPoint>), PredictionError> {
    let records: Vec<ObservationRecord> = serde_json::from_slice(body)
        .map_err(|e| PredictionError::InvalidInput(e.to_string()))?;
    let observations = records.len();

    // Model fitting is compute-bound; keep it off the async workers.
    let points = tokio::task::spawn_blocking(move || forecast::forecast(&records, &config))
        .await
        .map_err(|e| PredictionError::ForecastFailed(format!("forecast task failed: {}", e)))??;

    Ok((observations, points))
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/forecast/maintenance", post(forecast_maintenance))
        .route(
            "/forecast/equipment-failure",
            post(forecast_equipment_failure),
        )
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
