//! Feature reconciliation
//!
//! Builds the complete, ordered feature vector a model expects from a
//! possibly-partial input record. Missing features default to zero
//! rather than failing the request; callers that need stricter input
//! contracts must enforce them upstream, because this policy silently
//! degrades prediction quality for sparse records.

use crate::models::FeatureVector;
use serde_json::Value;
use std::collections::HashMap;

/// Produce a feature vector matching `required_features` exactly in
/// length and order. Absent features are substituted with `0`. Pure
/// function; never errors.
pub fn reconcile(required_features: &[String], raw_data: &HashMap<String, Value>) -> FeatureVector {
    let entries = required_features
        .iter()
        .map(|name| {
            let value = raw_data.get(name).cloned().unwrap_or(Value::from(0));
            (name.clone(), value)
        })
        .collect();
    FeatureVector::new(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn features(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_record_passes_through_in_order() {
        let required = features(&["flat_size", "resident_count", "amount_due"]);
        let raw = HashMap::from([
            ("amount_due".to_string(), json!(3200)),
            ("flat_size".to_string(), json!(2.0)),
            ("resident_count".to_string(), json!(4)),
        ]);

        let vector = reconcile(&required, &raw);

        assert_eq!(vector.len(), 3);
        let names: Vec<&str> = vector.names().collect();
        assert_eq!(names, vec!["flat_size", "resident_count", "amount_due"]);
        assert_eq!(vector.numeric_values().unwrap(), vec![2.0, 4.0, 3200.0]);
    }

    #[test]
    fn test_missing_features_default_to_zero() {
        let required = features(&["flat_size", "resident_count"]);
        let raw = HashMap::from([("flat_size".to_string(), json!(3))]);

        let vector = reconcile(&required, &raw);

        assert_eq!(vector.len(), 2);
        assert_eq!(vector.numeric_values().unwrap(), vec![3.0, 0.0]);
    }

    #[test]
    fn test_empty_record_yields_all_zeros() {
        let required = features(&["a", "b", "c"]);
        let vector = reconcile(&required, &HashMap::new());

        assert_eq!(vector.len(), 3);
        assert_eq!(vector.numeric_values().unwrap(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_extraneous_input_keys_are_ignored() {
        let required = features(&["a"]);
        let raw = HashMap::from([
            ("a".to_string(), json!(1)),
            ("unknown".to_string(), json!(99)),
        ]);

        let vector = reconcile(&required, &raw);

        assert_eq!(vector.len(), 1);
        assert_eq!(vector.numeric_values().unwrap(), vec![1.0]);
    }

    #[test]
    fn test_non_numeric_values_are_kept_for_the_estimator_boundary() {
        // Reconciliation never rejects; the estimator call surfaces the
        // type error as a prediction failure.
        let required = features(&["label"]);
        let raw = HashMap::from([("label".to_string(), json!("premium"))]);

        let vector = reconcile(&required, &raw);

        assert_eq!(vector.len(), 1);
        assert!(vector.numeric_values().is_err());
    }
}
