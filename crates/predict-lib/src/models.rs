//! Core data models for the prediction service

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Declared type of a registered model, fixed at training time.
///
/// The set is closed: a manifest entry with any other type string fails
/// registry load, so dispatch never sees an unknown type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Regression,
    Classification,
    Clustering,
}

/// Tabular prediction request: a model name and a partial feature record
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionRequest {
    pub model: String,
    pub data: HashMap<String, Value>,
}

/// Ordered feature values matching a model's required feature list
///
/// Invariant: length and order always equal the `required_features` the
/// vector was reconciled against. Values stay raw JSON scalars until the
/// estimator boundary coerces them.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(String, Value)>,
}

impl FeatureVector {
    pub fn new(entries: Vec<(String, Value)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    /// Coerce every value to f32 for estimator input. Only JSON numbers
    /// are accepted; anything else is a malformed feature the caller
    /// reports as a prediction failure.
    pub fn numeric_values(&self) -> Result<Vec<f32>, String> {
        self.entries
            .iter()
            .map(|(name, value)| match value.as_f64() {
                Some(v) if v.is_finite() => Ok(v as f32),
                _ => Err(format!("feature '{}' is not numeric", name)),
            })
            .collect()
    }
}

/// Typed prediction response, one variant per declared model type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PredictionResponse {
    Regression {
        model: String,
        predicted_amount: f64,
        risk_level: crate::risk::RiskLevel,
        confidence: f64,
    },
    Classification {
        model: String,
        prediction: i64,
        confidence: f64,
    },
    Clustering {
        model: String,
        cluster: i64,
    },
}

impl PredictionResponse {
    pub fn model(&self) -> &str {
        match self {
            PredictionResponse::Regression { model, .. } => model,
            PredictionResponse::Classification { model, .. } => model,
            PredictionResponse::Clustering { model, .. } => model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_type_parses_lowercase() {
        let t: ModelType = serde_json::from_value(json!("regression")).unwrap();
        assert_eq!(t, ModelType::Regression);
        let t: ModelType = serde_json::from_value(json!("clustering")).unwrap();
        assert_eq!(t, ModelType::Clustering);
    }

    #[test]
    fn test_model_type_rejects_unknown() {
        let result: Result<ModelType, _> = serde_json::from_value(json!("ranking"));
        assert!(result.is_err());
    }

    #[test]
    fn test_response_is_tagged_by_type() {
        let response = PredictionResponse::Clustering {
            model: "resident_segments".to_string(),
            cluster: 2,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "clustering");
        assert_eq!(json["model"], "resident_segments");
        assert_eq!(json["cluster"], 2);
    }

    #[test]
    fn test_numeric_values_rejects_strings() {
        let features = FeatureVector::new(vec![
            ("amount".to_string(), json!(120.5)),
            ("flat_size".to_string(), json!("big")),
        ]);
        let err = features.numeric_values().unwrap_err();
        assert!(err.contains("flat_size"));
    }

    #[test]
    fn test_numeric_values_preserves_order() {
        let features = FeatureVector::new(vec![
            ("b".to_string(), json!(2)),
            ("a".to_string(), json!(1)),
        ]);
        assert_eq!(features.numeric_values().unwrap(), vec![2.0, 1.0]);
    }
}
