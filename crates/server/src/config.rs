//! Server configuration

use anyhow::Result;
use serde::Deserialize;

/// Server configuration, read from `PREDICT_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Path to the model registry manifest
    #[serde(default = "default_registry_manifest")]
    pub registry_manifest: String,

    /// Override for the equipment failure-risk threshold
    #[serde(default)]
    pub failure_risk_threshold: Option<f64>,
}

fn default_api_port() -> u16 {
    8080
}

fn default_registry_manifest() -> String {
    "models/registry.json".to_string()
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("PREDICT"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| ServerConfig {
            api_port: default_api_port(),
            registry_manifest: default_registry_manifest(),
            failure_risk_threshold: None,
        }))
    }
}
