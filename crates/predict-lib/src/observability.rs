//! Observability infrastructure for the prediction service
//!
//! Provides:
//! - Prometheus metrics (prediction/forecast latency, served and error
//!   counters, loaded model count)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    forecast_latency_seconds: Histogram,
    predictions_served: IntCounterVec,
    prediction_errors: IntCounterVec,
    forecasts_served: IntCounterVec,
    forecast_errors: IntCounterVec,
    models_loaded: IntGauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "prediction_service_prediction_latency_seconds",
                "Time spent resolving, reconciling and running a tabular prediction",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            forecast_latency_seconds: register_histogram!(
                "prediction_service_forecast_latency_seconds",
                "Time spent validating, fitting and projecting a forecast",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register forecast_latency_seconds"),

            predictions_served: register_int_counter_vec!(
                "prediction_service_predictions_served_total",
                "Tabular predictions served, by declared model type",
                &["model_type"]
            )
            .expect("Failed to register predictions_served_total"),

            prediction_errors: register_int_counter_vec!(
                "prediction_service_prediction_errors_total",
                "Failed tabular predictions, by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            forecasts_served: register_int_counter_vec!(
                "prediction_service_forecasts_served_total",
                "Forecasts served, by pipeline variant",
                &["pipeline"]
            )
            .expect("Failed to register forecasts_served_total"),

            forecast_errors: register_int_counter_vec!(
                "prediction_service_forecast_errors_total",
                "Failed forecasts, by pipeline variant",
                &["pipeline"]
            )
            .expect("Failed to register forecast_errors_total"),

            models_loaded: register_int_gauge!(
                "prediction_service_models_loaded",
                "Number of model bundles in the startup-loaded registry"
            )
            .expect("Failed to register models_loaded"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner()
            .prediction_latency_seconds
            .observe(duration_secs);
    }

    pub fn observe_forecast_latency(&self, duration_secs: f64) {
        self.inner().forecast_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions_served(&self, model_type: &str) {
        self.inner()
            .predictions_served
            .with_label_values(&[model_type])
            .inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner()
            .prediction_errors
            .with_label_values(&[kind])
            .inc();
    }

    pub fn inc_forecasts_served(&self, pipeline: &str) {
        self.inner()
            .forecasts_served
            .with_label_values(&[pipeline])
            .inc();
    }

    pub fn inc_forecast_errors(&self, pipeline: &str) {
        self.inner()
            .forecast_errors
            .with_label_values(&[pipeline])
            .inc();
    }

    pub fn set_models_loaded(&self, count: i64) {
        self.inner().models_loaded.set(count);
    }
}

/// Structured logger for service events
///
/// Consistent JSON-formatted logging for predictions, forecasts and
/// lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, models_loaded: usize) {
        info!(
            event = "service_started",
            service = %self.service_name,
            version = %version,
            models_loaded = models_loaded,
            "Prediction service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service_name,
            reason = %reason,
            "Prediction service shutting down"
        );
    }

    pub fn log_prediction(&self, model: &str, model_type: &str, duration_us: u64) {
        info!(
            event = "prediction_served",
            service = %self.service_name,
            model = %model,
            model_type = %model_type,
            duration_us = duration_us,
            "Served tabular prediction"
        );
    }

    pub fn log_forecast(&self, pipeline: &str, observations: usize, points: usize, duration_us: u64) {
        info!(
            event = "forecast_served",
            service = %self.service_name,
            pipeline = %pipeline,
            observations = observations,
            points = points,
            duration_us = duration_us,
            "Served forecast"
        );
    }

    pub fn log_request_failure(&self, operation: &str, error: &str) {
        warn!(
            event = "request_failed",
            service = %self.service_name,
            operation = %operation,
            error = %error,
            "Request failed"
        );
    }
}
