//! Prediction strategy dispatch
//!
//! Routes a reconciled feature vector through the bundle's estimator and
//! shapes the raw output according to the declared model type. Each type
//! owns its response shape and post-processing rule; the match is
//! exhaustive because unknown types are rejected at registry load.

use crate::error::PredictionError;
use crate::models::{FeatureVector, ModelType, PredictionResponse};
use crate::registry::ModelBundle;
use crate::risk;
use tracing::debug;

/// Confidence reported for every regression prediction. A documented
/// static placeholder, not a statistic derived from the model.
pub const REGRESSION_CONFIDENCE: f64 = 0.85;

/// Run one prediction against a resolved bundle.
///
/// Estimator failures of any kind (malformed feature values, model
/// execution errors, empty output) are reported as `PredictionFailed`
/// and never propagate as panics.
pub fn predict(
    bundle: &ModelBundle,
    features: &FeatureVector,
) -> Result<PredictionResponse, PredictionError> {
    let inputs = features
        .numeric_values()
        .map_err(PredictionError::PredictionFailed)?;

    let outputs = bundle
        .estimator
        .run(&inputs)
        .map_err(|e| PredictionError::PredictionFailed(format!("{:#}", e)))?;

    if outputs.is_empty() {
        return Err(PredictionError::PredictionFailed(
            "estimator returned no outputs".to_string(),
        ));
    }

    debug!(
        model = %bundle.name,
        model_type = ?bundle.model_type,
        outputs = outputs.len(),
        "Estimator invocation completed"
    );

    let response = match bundle.model_type {
        ModelType::Clustering => PredictionResponse::Clustering {
            model: bundle.name.clone(),
            cluster: outputs[0].round() as i64,
        },
        ModelType::Classification => {
            let (prediction, confidence) = argmax(&outputs);
            PredictionResponse::Classification {
                model: bundle.name.clone(),
                prediction,
                confidence: round_to(confidence as f64, 3),
            }
        }
        ModelType::Regression => {
            let predicted_amount = round_to(outputs[0] as f64, 2);
            PredictionResponse::Regression {
                model: bundle.name.clone(),
                predicted_amount,
                risk_level: risk::classify_amount(predicted_amount),
                confidence: REGRESSION_CONFIDENCE,
            }
        }
    };

    Ok(response)
}

/// Index and value of the largest entry in a non-empty per-class vector.
fn argmax(values: &[f32]) -> (i64, f32) {
    let mut best_idx = 0usize;
    let mut best = values[0];
    for (idx, &value) in values.iter().enumerate().skip(1) {
        if value > best {
            best = value;
            best_idx = idx;
        }
    }
    (best_idx as i64, best)
}

fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
