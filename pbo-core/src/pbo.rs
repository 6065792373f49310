//! PBO aggregator and run-level summary statistics.
//!
//! PBO is the fraction of combinations with λ <= 0. λ = 0 counts as overfit:
//! the selected strategy was no better than the out-of-sample median.

use serde::{Deserialize, Serialize};

use crate::error::{CscvError, Result};
use crate::lambda::LambdaRecord;

/// Probability of backtest overfitting for a lambda sequence.
pub fn compute_pbo(lambdas: &[f64]) -> Result<f64> {
    if lambdas.is_empty() {
        return Err(CscvError::EmptyInput);
    }
    let overfit = lambdas.iter().filter(|&&l| l <= 0.0).count();
    Ok(overfit as f64 / lambdas.len() as f64)
}

/// OLS fit of out-of-sample score on in-sample score of the selected strategy.
///
/// A negative slope means strategies that look better in-sample tend to do
/// worse out-of-sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Aggregate diagnostics over all lambda records of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PboSummary {
    pub pbo: f64,
    pub n_combinations: usize,
    /// Mean of finite lambdas; `None` when every lambda is infinite.
    pub lambda_mean: Option<f64>,
    /// Median of finite lambdas.
    pub lambda_median: Option<f64>,
    pub positive_infinite_lambdas: usize,
    pub negative_infinite_lambdas: usize,
    /// Fraction of combinations where n* lost money out-of-sample.
    pub probability_of_loss: f64,
    pub degradation: Option<Degradation>,
    pub mean_kendall_tau: Option<f64>,
    pub mean_spearman_rho: Option<f64>,
}

impl PboSummary {
    pub fn from_records(records: &[LambdaRecord]) -> Result<Self> {
        let lambdas: Vec<f64> = records.iter().map(|r| r.lambda).collect();
        let pbo = compute_pbo(&lambdas)?;
        let n = records.len();

        let mut finite: Vec<f64> = lambdas.iter().copied().filter(|l| l.is_finite()).collect();
        finite.sort_by(|a, b| a.total_cmp(b));

        let losses = records.iter().filter(|r| r.oos_score < 0.0).count();
        let pairs: Vec<(f64, f64)> = records.iter().map(|r| (r.is_score, r.oos_score)).collect();

        Ok(Self {
            pbo,
            n_combinations: n,
            lambda_mean: mean(finite.iter().copied()),
            lambda_median: median_sorted(&finite),
            positive_infinite_lambdas: lambdas.iter().filter(|&&l| l == f64::INFINITY).count(),
            negative_infinite_lambdas: lambdas
                .iter()
                .filter(|&&l| l == f64::NEG_INFINITY)
                .count(),
            probability_of_loss: losses as f64 / n as f64,
            degradation: linear_fit(&pairs),
            mean_kendall_tau: mean(records.iter().filter_map(|r| r.kendall_tau)),
            mean_spearman_rho: mean(records.iter().filter_map(|r| r.spearman_rho)),
        })
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn median_sorted(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

/// Least-squares line through `(x, y)` points.
///
/// `None` with fewer than two points or when every `x` is identical.
pub fn linear_fit(points: &[(f64, f64)]) -> Option<Degradation> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for &(x, y) in points {
        sxx += (x - mean_x).powi(2);
        sxy += (x - mean_x) * (y - mean_y);
        syy += (y - mean_y).powi(2);
    }
    if sxx <= 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let r_squared = if syy > 0.0 {
        (sxy * sxy) / (sxx * syy)
    } else {
        1.0
    };

    Some(Degradation {
        slope,
        intercept: mean_y - slope * mean_x,
        r_squared,
    })
}
