//! Core library for the facility prediction service
//!
//! This crate provides:
//! - Model registry loading and lookup
//! - Feature reconciliation for tabular predictions
//! - Prediction strategy dispatch per declared model type
//! - The parameterized time-series forecast pipeline
//! - Risk classification of predicted values
//! - Health checks and observability

pub mod dispatch;
pub mod error;
pub mod estimator;
pub mod forecast;
pub mod health;
pub mod models;
pub mod observability;
pub mod reconcile;
pub mod registry;
pub mod risk;

pub use error::{ErrorBody, PredictionError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use registry::{ModelBundle, ModelRegistry};
