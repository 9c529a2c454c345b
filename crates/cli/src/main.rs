//! Facility prediction CLI
//!
//! Single-shot command transport: each subcommand takes one JSON
//! argument, prints the JSON response to stdout, and exits non-zero on
//! failure after printing a structured `{error, details?}` body.

use clap::{Parser, Subcommand};
use predict_lib::{
    dispatch,
    forecast::{self, ForecastConfig, ObservationRecord},
    models::PredictionRequest,
    reconcile,
    registry::ModelRegistry,
    PredictionError,
};
use std::path::PathBuf;
use std::process::ExitCode;

/// Facility prediction CLI
#[derive(Parser)]
#[command(name = "predictctl")]
#[command(author, version, about = "CLI for the facility prediction service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a tabular prediction from a `{"model": ..., "data": {...}}` payload
    Predict {
        /// JSON request payload
        payload: String,

        /// Path to the model registry manifest
        #[arg(
            long,
            env = "PREDICT_REGISTRY_MANIFEST",
            default_value = "models/registry.json"
        )]
        registry: PathBuf,
    },

    /// Run a time-series forecast from a JSON array of observations
    #[command(subcommand)]
    Forecast(ForecastCommands),
}

#[derive(Subcommand)]
enum ForecastCommands {
    /// Maintenance collection forecast: next 3 monthly periods with bounds
    Maintenance {
        /// JSON array of `{"ds": ..., "y": ...}` observations
        payload: String,
    },

    /// Equipment failure forecast: next 7 days with risk flags
    EquipmentFailure {
        /// JSON array of observations, optionally carrying
        /// `temperature_avg` and `equipment_age_days` columns
        payload: String,

        /// Failure-risk threshold (default 75)
        #[arg(long)]
        threshold: Option<f64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli.command) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let body = serde_json::to_string(&err.to_body())
                .unwrap_or_else(|_| r#"{"error":"Internal error"}"#.to_string());
            println!("{}", body);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<String, PredictionError> {
    match command {
        Commands::Predict { payload, registry } => {
            // Registry problems are reported before input problems, so a
            // misconfigured deployment is visible even with a bad payload.
            let registry = ModelRegistry::load(&registry)?;
            let request: PredictionRequest = serde_json::from_str(&payload)
                .map_err(|e| PredictionError::InvalidInput(e.to_string()))?;

            let bundle = registry.resolve(&request.model)?;
            let features = reconcile::reconcile(&bundle.required_features, &request.data);
            let response = dispatch::predict(bundle, &features)?;

            serde_json::to_string(&response)
                .map_err(|e| PredictionError::PredictionFailed(e.to_string()))
        }
        Commands::Forecast(command) => {
            let (payload, config) = match command {
                ForecastCommands::Maintenance { payload } => {
                    (payload, ForecastConfig::maintenance())
                }
                ForecastCommands::EquipmentFailure { payload, threshold } => {
                    (payload, ForecastConfig::equipment_failure(threshold))
                }
            };

            let records: Vec<ObservationRecord> = serde_json::from_str(&payload)
                .map_err(|e| PredictionError::InvalidInput(e.to_string()))?;
            let points = forecast::forecast(&records, &config)?;

            serde_json::to_string(&points)
                .map_err(|e| PredictionError::ForecastFailed(e.to_string()))
        }
    }
}
