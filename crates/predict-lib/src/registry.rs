//! Model registry
//!
//! Resolves model names to trained bundles. The registry is loaded once
//! at process start from a JSON manifest referencing ONNX model files
//! and is immutable afterwards, so concurrent lookups need no locking.
//! Any load failure is fatal: the process must not serve requests with a
//! partial registry.

use crate::error::PredictionError;
use crate::estimator::{Estimator, OnnxEstimator};
use crate::models::ModelType;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Manifest file shape: `{ "models": [ { name, file, features, type } ] }`.
/// Model file paths are resolved relative to the manifest location.
#[derive(Debug, Deserialize)]
struct Manifest {
    models: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: String,
    file: String,
    features: Vec<String>,
    #[serde(rename = "type")]
    model_type: ModelType,
}

/// A named trained estimator with its expected feature schema
#[derive(Clone)]
pub struct ModelBundle {
    pub name: String,
    pub estimator: Arc<dyn Estimator>,
    pub required_features: Vec<String>,
    pub model_type: ModelType,
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("name", &self.name)
            .field("required_features", &self.required_features)
            .field("model_type", &self.model_type)
            .finish_non_exhaustive()
    }
}

impl ModelBundle {
    pub fn new(
        name: impl Into<String>,
        estimator: Arc<dyn Estimator>,
        required_features: Vec<String>,
        model_type: ModelType,
    ) -> Self {
        Self {
            name: name.into(),
            estimator,
            required_features,
            model_type,
        }
    }
}

/// Startup-loaded, read-only map of model name to bundle
pub struct ModelRegistry {
    bundles: HashMap<String, ModelBundle>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("bundles", &self.bundles)
            .finish()
    }
}

impl ModelRegistry {
    /// Load the registry from a JSON manifest. Every model file must
    /// parse and every bundle must validate; the first failure aborts
    /// the load.
    pub fn load(manifest_path: &Path) -> Result<Self, PredictionError> {
        let raw = std::fs::read_to_string(manifest_path).map_err(|e| {
            PredictionError::RegistryLoad(format!(
                "cannot read manifest {}: {}",
                manifest_path.display(),
                e
            ))
        })?;

        let manifest: Manifest = serde_json::from_str(&raw).map_err(|e| {
            PredictionError::RegistryLoad(format!(
                "malformed manifest {}: {}",
                manifest_path.display(),
                e
            ))
        })?;

        let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        let mut bundles = Vec::with_capacity(manifest.models.len());
        for entry in manifest.models {
            let model_path = base_dir.join(&entry.file);
            let estimator = OnnxEstimator::from_file(&model_path, entry.features.len())
                .map_err(|e| {
                    PredictionError::RegistryLoad(format!("model '{}': {:#}", entry.name, e))
                })?;
            bundles.push(ModelBundle::new(
                entry.name,
                Arc::new(estimator),
                entry.features,
                entry.model_type,
            ));
        }

        let registry = Self::from_bundles(bundles)?;
        info!(
            manifest = %manifest_path.display(),
            models = registry.len(),
            "Model registry loaded"
        );
        Ok(registry)
    }

    /// Build a registry from pre-constructed bundles. Used by the loader
    /// and by tests injecting fake estimators.
    pub fn from_bundles(
        bundles: impl IntoIterator<Item = ModelBundle>,
    ) -> Result<Self, PredictionError> {
        let mut map = HashMap::new();
        for bundle in bundles {
            validate_features(&bundle)?;
            let name = bundle.name.clone();
            if map.insert(name.clone(), bundle).is_some() {
                return Err(PredictionError::RegistryLoad(format!(
                    "duplicate model name '{}'",
                    name
                )));
            }
        }
        Ok(Self { bundles: map })
    }

    /// Resolve a model name to its bundle.
    pub fn resolve(&self, name: &str) -> Result<&ModelBundle, PredictionError> {
        self.bundles
            .get(name)
            .ok_or_else(|| PredictionError::ModelNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.bundles.keys().map(|s| s.as_str())
    }
}

fn validate_features(bundle: &ModelBundle) -> Result<(), PredictionError> {
    if bundle.required_features.is_empty() {
        return Err(PredictionError::RegistryLoad(format!(
            "model '{}' declares no features",
            bundle.name
        )));
    }
    let mut seen = HashSet::new();
    for feature in &bundle.required_features {
        if !seen.insert(feature.as_str()) {
            return Err(PredictionError::RegistryLoad(format!(
                "model '{}' declares duplicate feature '{}'",
                bundle.name, feature
            )));
        }
    }
    Ok(())
}
