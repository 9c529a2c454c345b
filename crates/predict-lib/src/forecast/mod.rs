//! Time-series forecast pipeline
//!
//! One parameterized pipeline serves both forecast endpoints: validate
//! the observation sequence, coerce timestamps and values leniently,
//! auto-detect auxiliary regressors, fit the trend/seasonality engine,
//! and project a fixed horizon past the last observation. The two
//! shipped configurations differ only in seasonality flags, horizon,
//! minimum observation count, and risk-threshold presence.

mod engine;

pub use engine::{FittedModel, RegressorSeries, SeasonalityConfig, INTERVAL_Z};

use crate::error::PredictionError;
use crate::risk;
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Minimum observations for the maintenance collection forecast
pub const MAINTENANCE_MIN_OBSERVATIONS: usize = 2;

/// Minimum observations for the equipment failure forecast
pub const EQUIPMENT_MIN_OBSERVATIONS: usize = 3;

/// Future periods projected by the maintenance forecast
pub const MAINTENANCE_HORIZON: usize = 3;

/// Future periods projected by the equipment failure forecast
pub const EQUIPMENT_HORIZON: usize = 7;

/// Calendar unit of one horizon step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizonUnit {
    Days,
    Months,
}

/// Per-call-site pipeline configuration
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub horizon: usize,
    pub horizon_unit: HorizonUnit,
    pub min_observations: usize,
    pub seasonality: SeasonalityConfig,
    /// Candidate auxiliary columns; used only when numerically present
    /// in every cleaned observation.
    pub regressor_names: Vec<String>,
    /// When set, each projected point carries
    /// `failure_risk = yhat > threshold`.
    pub risk_threshold: Option<f64>,
    /// When set, each projected point carries prediction bounds.
    pub include_bounds: bool,
}

impl ForecastConfig {
    /// Maintenance collection-rate forecast: 3 monthly periods, yearly
    /// seasonality, prediction bounds.
    pub fn maintenance() -> Self {
        Self {
            horizon: MAINTENANCE_HORIZON,
            horizon_unit: HorizonUnit::Months,
            min_observations: MAINTENANCE_MIN_OBSERVATIONS,
            seasonality: SeasonalityConfig {
                yearly: true,
                weekly: false,
                daily: false,
            },
            regressor_names: Vec::new(),
            risk_threshold: None,
            include_bounds: true,
        }
    }

    /// Equipment failure forecast: 7 daily periods, weekly seasonality,
    /// environmental/age regressors, boolean risk flags.
    pub fn equipment_failure(threshold: Option<f64>) -> Self {
        Self {
            horizon: EQUIPMENT_HORIZON,
            horizon_unit: HorizonUnit::Days,
            min_observations: EQUIPMENT_MIN_OBSERVATIONS,
            seasonality: SeasonalityConfig {
                yearly: false,
                weekly: true,
                daily: false,
            },
            regressor_names: vec![
                "temperature_avg".to_string(),
                "equipment_age_days".to_string(),
            ],
            risk_threshold: Some(threshold.unwrap_or(risk::DEFAULT_FAILURE_THRESHOLD)),
            include_bounds: false,
        }
    }
}

/// One raw observation off the wire. `ds` and `y` must be present as
/// keys; values are coerced leniently during cleaning. Any additional
/// columns are kept as regressor candidates.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservationRecord {
    pub ds: Option<Value>,
    pub y: Option<Value>,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

/// One projected future point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub ds: NaiveDate,
    pub yhat: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yhat_lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yhat_upper: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_risk: Option<bool>,
}

struct CleanedRow {
    ds: NaiveDate,
    y: f64,
    /// One slot per candidate regressor, in config order
    regressors: Vec<Option<f64>>,
}

/// Run the forecast pipeline and return exactly `config.horizon` future
/// points in chronological order.
pub fn forecast(
    records: &[ObservationRecord],
    config: &ForecastConfig,
) -> Result<Vec<ForecastPoint>, PredictionError> {
    validate_cardinality(records, config)?;
    validate_schema(records)?;

    let rows = clean(records, config)?;
    let (regressors, carried_forward) = detect_regressors(&rows, config);

    let observations: Vec<(NaiveDate, f64)> = rows.iter().map(|r| (r.ds, r.y)).collect();
    let model = engine::fit(&observations, &regressors, config.seasonality)
        .map_err(PredictionError::ForecastFailed)?;

    let last_observed = observations
        .last()
        .map(|(ds, _)| *ds)
        .expect("cleaned series is non-empty");

    project(&model, last_observed, &carried_forward, config)
}

fn validate_cardinality(
    records: &[ObservationRecord],
    config: &ForecastConfig,
) -> Result<(), PredictionError> {
    if records.len() < config.min_observations {
        return Err(PredictionError::InsufficientData {
            needed: config.min_observations,
            got: records.len(),
        });
    }
    Ok(())
}

fn validate_schema(records: &[ObservationRecord]) -> Result<(), PredictionError> {
    for (idx, record) in records.iter().enumerate() {
        if record.ds.is_none() {
            return Err(PredictionError::MissingFields(format!(
                "record {} has no 'ds' field",
                idx
            )));
        }
        if record.y.is_none() {
            return Err(PredictionError::MissingFields(format!(
                "record {} has no 'y' field",
                idx
            )));
        }
    }
    Ok(())
}

/// Coerce timestamps and values, dropping rows that fail either
/// coercion, and require at least two distinct timestamps afterwards.
fn clean(
    records: &[ObservationRecord],
    config: &ForecastConfig,
) -> Result<Vec<CleanedRow>, PredictionError> {
    let mut rows: Vec<CleanedRow> = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let ds = record.ds.as_ref().and_then(parse_date);
        let y = record.y.as_ref().and_then(parse_number);
        let (ds, y) = match (ds, y) {
            (Some(ds), Some(y)) => (ds, y),
            _ => {
                debug!(record = idx, "Dropping observation that failed coercion");
                continue;
            }
        };
        let regressors = config
            .regressor_names
            .iter()
            .map(|name| record.extras.get(name).and_then(parse_number))
            .collect();
        rows.push(CleanedRow { ds, y, regressors });
    }

    if rows.is_empty() {
        return Err(PredictionError::InvalidTimeSeries(
            "no usable observations after cleaning".to_string(),
        ));
    }

    rows.sort_by_key(|row| row.ds);
    let distinct = count_distinct_timestamps(&rows);
    if distinct < 2 {
        return Err(PredictionError::InvalidTimeSeries(format!(
            "need at least 2 distinct timestamps, found {}",
            distinct
        )));
    }

    Ok(rows)
}

fn count_distinct_timestamps(rows: &[CleanedRow]) -> usize {
    let mut distinct = 0;
    let mut previous: Option<NaiveDate> = None;
    for row in rows {
        if previous != Some(row.ds) {
            distinct += 1;
            previous = Some(row.ds);
        }
    }
    distinct
}

/// A candidate regressor is used only when every cleaned row carries a
/// numeric value for it; partially-present columns are ignored. The
/// last observed value of each detected regressor is carried forward
/// over the horizon — regressor futures are not forecast.
fn detect_regressors(
    rows: &[CleanedRow],
    config: &ForecastConfig,
) -> (Vec<RegressorSeries>, Vec<f64>) {
    let mut detected = Vec::new();
    let mut carried_forward = Vec::new();
    for (slot, name) in config.regressor_names.iter().enumerate() {
        let values: Option<Vec<f64>> = rows.iter().map(|row| row.regressors[slot]).collect();
        match values {
            Some(values) => {
                let last = *values.last().expect("cleaned series is non-empty");
                debug!(regressor = %name, "Detected auxiliary regressor");
                detected.push(RegressorSeries {
                    name: name.clone(),
                    values,
                });
                carried_forward.push(last);
            }
            None => {
                debug!(regressor = %name, "Regressor not fully present, ignoring");
            }
        }
    }
    (detected, carried_forward)
}

fn project(
    model: &FittedModel,
    last_observed: NaiveDate,
    carried_forward: &[f64],
    config: &ForecastConfig,
) -> Result<Vec<ForecastPoint>, PredictionError> {
    let mut points = Vec::with_capacity(config.horizon);
    for step in 1..=config.horizon {
        let ds = advance(last_observed, step, config.horizon_unit).ok_or_else(|| {
            PredictionError::ForecastFailed("horizon extends past representable dates".to_string())
        })?;
        let yhat = model
            .predict(ds, carried_forward)
            .map_err(PredictionError::ForecastFailed)?;

        let (yhat_lower, yhat_upper) = if config.include_bounds {
            let half_width = model.interval_half_width(step);
            (Some(yhat - half_width), Some(yhat + half_width))
        } else {
            (None, None)
        };

        let failure_risk = config
            .risk_threshold
            .map(|threshold| risk::exceeds_threshold(yhat, threshold));

        points.push(ForecastPoint {
            ds,
            yhat,
            yhat_lower,
            yhat_upper,
            failure_risk,
        });
    }
    Ok(points)
}

fn advance(from: NaiveDate, steps: usize, unit: HorizonUnit) -> Option<NaiveDate> {
    match unit {
        HorizonUnit::Days => from.checked_add_days(Days::new(steps as u64)),
        HorizonUnit::Months => from.checked_add_months(Months::new(steps as u32)),
    }
}

/// Lenient timestamp coercion: `YYYY-MM-DD`, `YYYY-MM` (first of
/// month), `YYYY/MM/DD`, and common date-time shapes.
fn parse_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if s.len() == 7 {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d") {
            return Some(date);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
        return Some(date);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    None
}

/// Lenient value coercion: JSON numbers and numeric strings.
fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
