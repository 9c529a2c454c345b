//! Risk classification for predicted values
//!
//! Maps continuous predictions to discrete risk bands: a 3-tier band for
//! predicted amounts and a boolean threshold crossing for forecasts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount above which a prediction is classified High risk (strict >)
pub const HIGH_RISK_AMOUNT: f64 = 4000.0;

/// Amount above which a prediction is classified Medium risk (strict >)
pub const MEDIUM_RISK_AMOUNT: f64 = 2500.0;

/// Default failure-risk threshold for the equipment forecast pipeline
pub const DEFAULT_FAILURE_THRESHOLD: f64 = 75.0;

/// Discrete risk band for a predicted amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::Low => write!(f, "Low"),
        }
    }
}

/// Classify a predicted amount into a risk band.
///
/// Thresholds are exclusive and evaluated high-to-low, so exactly one
/// band matches.
pub fn classify_amount(amount: f64) -> RiskLevel {
    if amount > HIGH_RISK_AMOUNT {
        RiskLevel::High
    } else if amount > MEDIUM_RISK_AMOUNT {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// True iff `value` strictly exceeds `threshold`.
pub fn exceeds_threshold(value: f64, threshold: f64) -> bool {
    value > threshold
}
