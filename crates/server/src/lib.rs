//! HTTP plumbing for the facility prediction service
//!
//! The decision logic lives in `predict-lib`; this crate wires it to an
//! axum router, configuration, and process lifecycle.

pub mod api;
pub mod config;
