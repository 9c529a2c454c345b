//! Trained-estimator boundary
//!
//! Registered models are opaque pre-trained ONNX bundles executed with
//! tract. The service never inspects model internals; it feeds the
//! reconciled feature vector in and reads a flat output vector back,
//! which the dispatcher interprets per declared model type.

use anyhow::{Context, Result};
use std::path::Path;
use tract_onnx::prelude::*;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Opaque trained model: one row of features in, a flat output vector out.
///
/// Regression models emit a single value, classifiers a per-class
/// probability vector, clustering models the assigned cluster id.
pub trait Estimator: Send + Sync {
    fn run(&self, features: &[f32]) -> Result<Vec<f32>>;
}

/// ONNX-backed estimator using tract for lightweight inference
pub struct OnnxEstimator {
    plan: TractModel,
    input_width: usize,
}

impl OnnxEstimator {
    /// Load and optimize an ONNX model from bytes. `input_width` is the
    /// length of the model's required feature list.
    pub fn from_bytes(model_bytes: &[u8], input_width: usize) -> Result<Self> {
        let plan = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, input_width]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(Self { plan, input_width })
    }

    /// Load an ONNX model from disk.
    pub fn from_file(path: &Path, input_width: usize) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read model file {}", path.display()))?;
        Self::from_bytes(&bytes, input_width)
    }

    fn features_to_tensor(&self, features: &[f32]) -> Result<Tensor> {
        let tensor = tract_ndarray::Array2::from_shape_vec(
            (1, self.input_width),
            features.to_vec(),
        )
        .context("Feature vector does not match model input width")?
        .into();
        Ok(tensor)
    }
}

impl Estimator for OnnxEstimator {
    fn run(&self, features: &[f32]) -> Result<Vec<f32>> {
        if features.len() != self.input_width {
            anyhow::bail!(
                "estimator expects {} features, got {}",
                self.input_width,
                features.len()
            );
        }

        let input = self.features_to_tensor(features)?;
        let result = self.plan.run(tvec!(input.into()))?;
        let output = result.first().context("No output from model")?;
        let view = output.to_array_view::<f32>()?;
        Ok(view.iter().copied().collect())
    }
}

/// Deterministic estimator that replays a fixed output vector.
///
/// Stands in for a real model bundle in tests and smoke checks; also
/// usable to probe response post-processing without a model file.
#[derive(Debug, Clone)]
pub struct FixedEstimator {
    outputs: Vec<f32>,
}

impl FixedEstimator {
    pub fn new(outputs: Vec<f32>) -> Self {
        Self { outputs }
    }
}

impl Estimator for FixedEstimator {
    fn run(&self, _features: &[f32]) -> Result<Vec<f32>> {
        Ok(self.outputs.clone())
    }
}

/// Estimator that always fails; exercises error paths in tests.
#[derive(Debug, Clone)]
pub struct FailingEstimator {
    message: String,
}

impl FailingEstimator {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Estimator for FailingEstimator {
    fn run(&self, _features: &[f32]) -> Result<Vec<f32>> {
        anyhow::bail!("{}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_estimator_replays_outputs() {
        let estimator = FixedEstimator::new(vec![0.1, 0.7, 0.2]);
        let outputs = estimator.run(&[1.0, 2.0]).unwrap();
        assert_eq!(outputs, vec![0.1, 0.7, 0.2]);
    }

    #[test]
    fn test_failing_estimator_reports_message() {
        let estimator = FailingEstimator::new("matrix not invertible");
        let err = estimator.run(&[1.0]).unwrap_err();
        assert!(err.to_string().contains("matrix not invertible"));
    }

    #[test]
    fn test_onnx_estimator_rejects_garbage_bytes() {
        let result = OnnxEstimator::from_bytes(b"not an onnx model", 4);
        assert!(result.is_err());
    }
}
