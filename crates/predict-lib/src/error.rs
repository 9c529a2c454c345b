//! Error taxonomy for the prediction service
//!
//! Every failure a request can produce maps to one of these variants.
//! Boundaries (HTTP handlers, the CLI) render them as a structured
//! `{error, details?}` body instead of surfacing a raw error chain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All failures the prediction and forecast paths can report
#[derive(Debug, Error)]
pub enum PredictionError {
    /// The model registry could not be loaded at startup. Fatal: the
    /// process must not serve requests without a registry.
    #[error("failed to load model registry: {0}")]
    RegistryLoad(String),

    /// The request payload was structurally invalid (missing top-level
    /// keys, unparseable body).
    #[error("invalid input payload: {0}")]
    InvalidInput(String),

    /// The named model is not present in the registry.
    #[error("model '{0}' not found")]
    ModelNotFound(String),

    /// The estimator invocation failed (malformed feature values,
    /// model execution error).
    #[error("prediction failed: {0}")]
    PredictionFailed(String),

    /// Too few observations for the requested forecast pipeline.
    #[error("insufficient data: got {got} observations, need at least {needed}")]
    InsufficientData { needed: usize, got: usize },

    /// An observation record is missing the timestamp or value field.
    #[error("missing fields: {0}")]
    MissingFields(String),

    /// After cleaning, the series is unusable (empty, or fewer than two
    /// distinct timestamps).
    #[error("invalid time series: {0}")]
    InvalidTimeSeries(String),

    /// Model fitting or horizon projection failed.
    #[error("forecast failed: {0}")]
    ForecastFailed(String),
}

impl PredictionError {
    /// True for failures caused by the request payload rather than the
    /// service. Callers should not retry these.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictionError::InvalidInput(_)
                | PredictionError::ModelNotFound(_)
                | PredictionError::InsufficientData { .. }
                | PredictionError::MissingFields(_)
                | PredictionError::InvalidTimeSeries(_)
        )
    }

    /// Stable snake_case name of the variant, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::RegistryLoad(_) => "registry_load",
            PredictionError::InvalidInput(_) => "invalid_input",
            PredictionError::ModelNotFound(_) => "model_not_found",
            PredictionError::PredictionFailed(_) => "prediction_failed",
            PredictionError::InsufficientData { .. } => "insufficient_data",
            PredictionError::MissingFields(_) => "missing_fields",
            PredictionError::InvalidTimeSeries(_) => "invalid_time_series",
            PredictionError::ForecastFailed(_) => "forecast_failed",
        }
    }

    /// Render as the wire-level error body.
    pub fn to_body(&self) -> ErrorBody {
        match self {
            PredictionError::RegistryLoad(details) => ErrorBody {
                error: "Failed to load model registry".to_string(),
                details: Some(details.clone()),
            },
            PredictionError::InvalidInput(details) => ErrorBody {
                error: "Invalid input payload".to_string(),
                details: Some(details.clone()),
            },
            PredictionError::ModelNotFound(name) => ErrorBody {
                error: format!("Model '{}' not found", name),
                details: None,
            },
            PredictionError::PredictionFailed(details) => ErrorBody {
                error: "Prediction failed".to_string(),
                details: Some(details.clone()),
            },
            PredictionError::InsufficientData { .. }
            | PredictionError::MissingFields(_)
            | PredictionError::InvalidTimeSeries(_) => ErrorBody {
                error: self.to_string(),
                details: None,
            },
            PredictionError::ForecastFailed(details) => ErrorBody {
                error: "Forecast failed".to_string(),
                details: Some(details.clone()),
            },
        }
    }
}

/// Structured error response returned by every transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found_body_has_no_details() {
        let err = PredictionError::ModelNotFound("expense_forecaster".to_string());
        let body = err.to_body();
        assert_eq!(body.error, "Model 'expense_forecaster' not found");
        assert!(body.details.is_none());
    }

    #[test]
    fn test_prediction_failed_carries_details() {
        let err = PredictionError::PredictionFailed("feature 'flat_size' is not numeric".into());
        let body = err.to_body();
        assert_eq!(body.error, "Prediction failed");
        assert_eq!(
            body.details.as_deref(),
            Some("feature 'flat_size' is not numeric")
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(PredictionError::ModelNotFound("x".into()).is_client_error());
        assert!(PredictionError::InsufficientData { needed: 2, got: 1 }.is_client_error());
        assert!(PredictionError::MissingFields("ds".into()).is_client_error());
        assert!(!PredictionError::PredictionFailed("boom".into()).is_client_error());
        assert!(!PredictionError::ForecastFailed("boom".into()).is_client_error());
    }

    #[test]
    fn test_error_body_serialization_omits_absent_details() {
        let body = PredictionError::ModelNotFound("x".into()).to_body();
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("details").is_none());
    }
}
