//! Trend/seasonality estimation engine
//!
//! Least-squares fit of an additive model over a cleaned series:
//! intercept + linear trend + Fourier seasonal terms + optional external
//! regressors. Prediction intervals come from the in-sample residual
//! spread and widen with the square root of the horizon step.
//!
//! When the series is too short for the requested term set, or the
//! normal equations turn out singular, the engine retries with a reduced
//! term set down to an intercept-only fit rather than failing the
//! request.

use chrono::{Datelike, NaiveDate};

/// z-score for the 95% prediction interval carried on forecast bounds
pub const INTERVAL_Z: f64 = 1.96;

const DAYS_PER_YEAR: f64 = 365.25;
const DAYS_PER_WEEK: f64 = 7.0;
const SINGULAR_PIVOT_RATIO: f64 = 1e-9;

/// Seasonal components to include in the fit. Observations are
/// date-granular, so sub-daily cycles reduce to a constant; the `daily`
/// flag exists for configuration parity and contributes no terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonalityConfig {
    pub yearly: bool,
    pub weekly: bool,
    pub daily: bool,
}

/// A fully-populated auxiliary predictor series, one value per
/// observation, in observation order.
#[derive(Debug, Clone)]
pub struct RegressorSeries {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Term {
    Intercept,
    Trend,
    YearlySin,
    YearlyCos,
    WeeklySin,
    WeeklyCos,
    Regressor(usize),
}

/// A fitted additive model ready to project future dates
#[derive(Debug, Clone)]
pub struct FittedModel {
    terms: Vec<Term>,
    coefficients: Vec<f64>,
    origin: NaiveDate,
    residual_std: f64,
}

impl FittedModel {
    /// Point estimate for `date` given regressor values in the order the
    /// model was fitted with.
    pub fn predict(&self, date: NaiveDate, regressors: &[f64]) -> Result<f64, String> {
        let row = design_row(&self.terms, date, self.time_index(date), regressors);
        let estimate: f64 = row
            .iter()
            .zip(self.coefficients.iter())
            .map(|(x, c)| x * c)
            .sum();
        if !estimate.is_finite() {
            return Err(format!("projection for {} is not finite", date));
        }
        Ok(estimate)
    }

    /// Half-width of the prediction interval at 1-based horizon `step`.
    pub fn interval_half_width(&self, step: usize) -> f64 {
        INTERVAL_Z * self.residual_std * (step as f64).sqrt()
    }

    fn time_index(&self, date: NaiveDate) -> f64 {
        (date - self.origin).num_days() as f64
    }
}

/// Fit the additive model, reducing the term set as needed until the
/// system is solvable. `regressors` must each carry exactly one value
/// per observation.
pub fn fit(
    observations: &[(NaiveDate, f64)],
    regressors: &[RegressorSeries],
    seasonality: SeasonalityConfig,
) -> Result<FittedModel, String> {
    if observations.is_empty() {
        return Err("cannot fit an empty series".to_string());
    }
    for series in regressors {
        if series.values.len() != observations.len() {
            return Err(format!(
                "regressor '{}' has {} values for {} observations",
                series.name,
                series.values.len(),
                observations.len()
            ));
        }
    }

    let origin = observations[0].0;
    let n = observations.len();

    for terms in term_ladder(seasonality, regressors.len()) {
        if terms.len() > n {
            continue;
        }
        if let Some(model) = try_fit(&terms, observations, regressors, origin) {
            return Ok(model);
        }
    }

    // Unreachable in practice: the intercept-only system is never
    // singular for a non-empty series.
    Err("no solvable term set for series".to_string())
}

/// Candidate term sets, richest first.
fn term_ladder(seasonality: SeasonalityConfig, regressor_count: usize) -> Vec<Vec<Term>> {
    let regressor_terms: Vec<Term> = (0..regressor_count).map(Term::Regressor).collect();
    let mut seasonal_terms = Vec::new();
    if seasonality.yearly {
        seasonal_terms.extend([Term::YearlySin, Term::YearlyCos]);
    }
    if seasonality.weekly {
        seasonal_terms.extend([Term::WeeklySin, Term::WeeklyCos]);
    }

    let mut ladder: Vec<Vec<Term>> = Vec::new();
    let mut push = |terms: Vec<Term>| {
        if !ladder.contains(&terms) {
            ladder.push(terms);
        }
    };

    let mut full = vec![Term::Intercept, Term::Trend];
    full.extend(seasonal_terms.iter().copied());
    full.extend(regressor_terms.iter().copied());
    push(full);

    let mut no_seasonal = vec![Term::Intercept, Term::Trend];
    no_seasonal.extend(regressor_terms.iter().copied());
    push(no_seasonal);

    push(vec![Term::Intercept, Term::Trend]);
    push(vec![Term::Intercept]);

    ladder
}

fn try_fit(
    terms: &[Term],
    observations: &[(NaiveDate, f64)],
    regressors: &[RegressorSeries],
    origin: NaiveDate,
) -> Option<FittedModel> {
    let n = observations.len();
    let k = terms.len();

    let rows: Vec<Vec<f64>> = observations
        .iter()
        .enumerate()
        .map(|(i, (date, _))| {
            let t = (*date - origin).num_days() as f64;
            let values: Vec<f64> = regressors.iter().map(|r| r.values[i]).collect();
            design_row(terms, *date, t, &values)
        })
        .collect();
    let targets: Vec<f64> = observations.iter().map(|(_, y)| *y).collect();

    // Normal equations: (XᵀX) c = Xᵀy
    let mut xtx = vec![vec![0.0f64; k]; k];
    let mut xty = vec![0.0f64; k];
    for (row, &y) in rows.iter().zip(targets.iter()) {
        for i in 0..k {
            xty[i] += row[i] * y;
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    let coefficients = solve(xtx, xty)?;

    let residual_sq_sum: f64 = rows
        .iter()
        .zip(targets.iter())
        .map(|(row, &y)| {
            let fitted: f64 = row.iter().zip(coefficients.iter()).map(|(x, c)| x * c).sum();
            (y - fitted).powi(2)
        })
        .sum();
    let dof = n.saturating_sub(k);
    let residual_std = if dof > 0 {
        (residual_sq_sum / dof as f64).sqrt()
    } else {
        0.0
    };

    if !residual_std.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
        return None;
    }

    Some(FittedModel {
        terms: terms.to_vec(),
        coefficients,
        origin,
        residual_std,
    })
}

fn design_row(terms: &[Term], date: NaiveDate, t: f64, regressors: &[f64]) -> Vec<f64> {
    use std::f64::consts::TAU;
    terms
        .iter()
        .map(|term| match term {
            Term::Intercept => 1.0,
            Term::Trend => t,
            Term::YearlySin => (TAU * date.ordinal() as f64 / DAYS_PER_YEAR).sin(),
            Term::YearlyCos => (TAU * date.ordinal() as f64 / DAYS_PER_YEAR).cos(),
            Term::WeeklySin => {
                (TAU * date.weekday().num_days_from_monday() as f64 / DAYS_PER_WEEK).sin()
            }
            Term::WeeklyCos => {
                (TAU * date.weekday().num_days_from_monday() as f64 / DAYS_PER_WEEK).cos()
            }
            Term::Regressor(i) => regressors.get(*i).copied().unwrap_or(0.0),
        })
        .collect()
}

/// Gaussian elimination with partial pivoting. Returns None when the
/// system is singular (pivot vanishes relative to the matrix scale),
/// which triggers the caller's fallback.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let k = b.len();
    let scale = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    let pivot_floor = (scale * SINGULAR_PIVOT_RATIO).max(f64::MIN_POSITIVE);

    for col in 0..k {
        let pivot_row = (col..k)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot_row][col].abs() < pivot_floor {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..k {
            let factor = a[row][col] / a[col][col];
            for j in col..k {
                a[row][j] -= factor * a[col][j];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0f64; k];
    for col in (0..k).rev() {
        let sum: f64 = ((col + 1)..k).map(|j| a[col][j] * x[j]).sum();
        x[col] = (b[col] - sum) / a[col][col];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_SEASONALITY: SeasonalityConfig = SeasonalityConfig {
        yearly: false,
        weekly: false,
        daily: false,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily_series(start: NaiveDate, values: &[f64]) -> Vec<(NaiveDate, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (start + chrono::Days::new(i as u64), v))
            .collect()
    }

    #[test]
    fn test_linear_series_fits_exactly() {
        let start = date(2024, 1, 1);
        let obs = daily_series(start, &[10.0, 12.0, 14.0, 16.0, 18.0]);
        let model = fit(&obs, &[], NO_SEASONALITY).unwrap();

        // Next day continues the 2-per-day trend
        let next = model.predict(start + chrono::Days::new(5), &[]).unwrap();
        assert!((next - 20.0).abs() < 1e-6, "got {}", next);
    }

    #[test]
    fn test_exact_fit_has_zero_interval_width() {
        let start = date(2024, 1, 1);
        let obs = daily_series(start, &[5.0, 6.0]);
        let model = fit(&obs, &[], NO_SEASONALITY).unwrap();
        assert_eq!(model.interval_half_width(1), 0.0);
    }

    #[test]
    fn test_interval_widens_with_horizon() {
        let start = date(2024, 1, 1);
        // Noisy series leaves nonzero residuals
        let obs = daily_series(start, &[10.0, 13.0, 11.0, 15.0, 12.0, 16.0]);
        let model = fit(&obs, &[], NO_SEASONALITY).unwrap();
        assert!(model.interval_half_width(1) > 0.0);
        assert!(model.interval_half_width(4) > model.interval_half_width(1));
    }

    #[test]
    fn test_two_points_with_yearly_seasonality_falls_back_to_trend() {
        // 4 seasonal+trend terms cannot fit 2 points; the ladder drops
        // to intercept+trend, which fits exactly.
        let obs = vec![(date(2024, 1, 1), 80.0), (date(2024, 2, 1), 82.0)];
        let seasonality = SeasonalityConfig {
            yearly: true,
            weekly: false,
            daily: false,
        };
        let model = fit(&obs, &[], seasonality).unwrap();
        let projected = model.predict(date(2024, 3, 1), &[]).unwrap();
        assert!(projected > 82.0, "trend should continue, got {}", projected);
    }

    #[test]
    fn test_constant_regressor_is_dropped_as_singular() {
        // A constant regressor is collinear with the intercept; the
        // ladder must still produce a usable trend fit.
        let start = date(2024, 1, 1);
        let obs = daily_series(start, &[1.0, 2.0, 3.0, 4.0]);
        let regressors = vec![RegressorSeries {
            name: "ambient".to_string(),
            values: vec![5.0; 4],
        }];
        let model = fit(&obs, &regressors, NO_SEASONALITY).unwrap();
        let next = model.predict(start + chrono::Days::new(4), &[5.0]).unwrap();
        assert!((next - 5.0).abs() < 1e-6, "got {}", next);
    }

    #[test]
    fn test_regressor_length_mismatch_is_an_error() {
        let obs = vec![(date(2024, 1, 1), 1.0), (date(2024, 1, 2), 2.0)];
        let regressors = vec![RegressorSeries {
            name: "temperature_avg".to_string(),
            values: vec![20.0],
        }];
        let err = fit(&obs, &regressors, NO_SEASONALITY).unwrap_err();
        assert!(err.contains("temperature_avg"));
    }

    #[test]
    fn test_empty_series_is_an_error() {
        assert!(fit(&[], &[], NO_SEASONALITY).is_err());
    }

    #[test]
    fn test_influential_regressor_shifts_projection() {
        // y = 2 * regressor, no trend in time
        let start = date(2024, 1, 1);
        let obs = daily_series(start, &[2.0, 6.0, 4.0, 10.0, 8.0, 6.0, 12.0, 4.0]);
        let regressors = vec![RegressorSeries {
            name: "load".to_string(),
            values: vec![1.0, 3.0, 2.0, 5.0, 4.0, 3.0, 6.0, 2.0],
        }];
        let model = fit(&obs, &regressors, NO_SEASONALITY).unwrap();

        let low = model.predict(start + chrono::Days::new(8), &[1.0]).unwrap();
        let high = model.predict(start + chrono::Days::new(8), &[6.0]).unwrap();
        assert!(high > low + 5.0, "regressor should drive estimate: {} vs {}", low, high);
    }
}
