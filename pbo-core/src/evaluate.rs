//! Performance evaluator — one scalar score per strategy column.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CscvError;
use crate::matrix::ObservationMatrix;

/// Default risk-free rate subtracted from the per-period mean by `Sharpe`.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Standard deviations at or below this (relative to `max(1, |mean|)`) are
/// treated as zero. Absorbs rounding noise on constant columns.
const DEGENERATE_STD_EPS: f64 = 1e-12;

/// Scoring rule applied to each strategy column.
///
/// Serialized by name; deserialization goes through [`FromStr`], so the
/// `mean` alias is accepted wherever a name is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EvaluationMethod {
    /// Arithmetic mean of the column.
    #[default]
    Average,
    /// `(mean - risk_free_rate) / sample_std`, or 0 for a degenerate column.
    Sharpe,
}

impl EvaluationMethod {
    pub fn name(self) -> &'static str {
        match self {
            EvaluationMethod::Average => "average",
            EvaluationMethod::Sharpe => "sharpe",
        }
    }
}

impl fmt::Display for EvaluationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EvaluationMethod {
    type Err = CscvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "average" | "mean" => Ok(EvaluationMethod::Average),
            "sharpe" => Ok(EvaluationMethod::Sharpe),
            other => Err(CscvError::UnknownEvaluationMethod(other.to_string())),
        }
    }
}

impl TryFrom<String> for EvaluationMethod {
    type Error = CscvError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<EvaluationMethod> for String {
    fn from(method: EvaluationMethod) -> Self {
        method.name().to_string()
    }
}

/// Per-column scores for one matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    pub values: Vec<f64>,
    /// Columns whose Sharpe denominator was degenerate and were scored 0.
    pub degenerate: Vec<usize>,
}

impl Scores {
    /// First column whose score is undefined (`NaN`).
    pub fn first_missing(&self) -> Option<usize> {
        self.values.iter().position(|v| v.is_nan())
    }
}

/// Mean and sample standard deviation (n - 1) of a series.
///
/// The deviation is `NaN` for fewer than two observations.
pub fn mean_and_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (sum, n) = values.clone().fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = sum / n as f64;
    if n < 2 {
        return (mean, f64::NAN);
    }
    let ss: f64 = values.map(|v| (v - mean).powi(2)).sum();
    (mean, (ss / (n - 1) as f64).sqrt())
}

/// Score every column of `matrix` with `method`.
///
/// Pure function. A `NaN` observation yields a `NaN` score for its column;
/// the caller decides whether that is fatal. Under `Sharpe` an infinite
/// observation leaves the ratio undefined and is scored `NaN` as well, not
/// counted as degenerate variance.
pub fn evaluate(matrix: &ObservationMatrix, method: EvaluationMethod, risk_free_rate: f64) -> Scores {
    let mut degenerate = Vec::new();
    let values = (0..matrix.cols())
        .map(|col| {
            let (mean, std) = mean_and_std(matrix.column(col));
            match method {
                EvaluationMethod::Average => mean,
                EvaluationMethod::Sharpe => {
                    if !mean.is_finite() {
                        f64::NAN
                    } else if !(std > DEGENERATE_STD_EPS * mean.abs().max(1.0)) {
                        degenerate.push(col);
                        0.0
                    } else {
                        (mean - risk_free_rate) / std
                    }
                }
            }
        })
        .collect();

    Scores { values, degenerate }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> ObservationMatrix {
        ObservationMatrix::from_columns(&[
            vec![0.01, 0.03, 0.02, 0.04],
            vec![0.1, 0.1, 0.1, 0.1],
            vec![-0.02, 0.0, 0.02, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn parse_method_names() {
        assert_eq!("average".parse::<EvaluationMethod>().unwrap(), EvaluationMethod::Average);
        assert_eq!(" Sharpe ".parse::<EvaluationMethod>().unwrap(), EvaluationMethod::Sharpe);
        assert_eq!(
            "sortino".parse::<EvaluationMethod>().unwrap_err(),
            CscvError::UnknownEvaluationMethod("sortino".into())
        );
    }

    #[test]
    fn average_is_column_mean() {
        let s = evaluate(&matrix(), EvaluationMethod::Average, DEFAULT_RISK_FREE_RATE);
        assert!((s.values[0] - 0.025).abs() < 1e-12);
        assert!((s.values[1] - 0.1).abs() < 1e-12);
        assert!(s.values[2].abs() < 1e-12);
        assert!(s.degenerate.is_empty());
    }

    #[test]
    fn sharpe_subtracts_risk_free_and_divides_by_sample_std() {
        let s = evaluate(&matrix(), EvaluationMethod::Sharpe, 0.0);
        let (mean, std) = mean_and_std([0.01, 0.03, 0.02, 0.04].into_iter());
        assert!((s.values[0] - mean / std).abs() < 1e-9);

        let with_rf = evaluate(&matrix(), EvaluationMethod::Sharpe, 0.02);
        assert!((with_rf.values[0] - (mean - 0.02) / std).abs() < 1e-9);
    }

    #[test]
    fn zero_variance_column_scores_exactly_zero() {
        let s = evaluate(&matrix(), EvaluationMethod::Sharpe, DEFAULT_RISK_FREE_RATE);
        assert_eq!(s.values[1], 0.0);
        assert_eq!(s.degenerate, vec![1]);
    }

    #[test]
    fn single_row_sharpe_is_degenerate() {
        let m = ObservationMatrix::from_rows(vec![vec![0.5, 1.0]]).unwrap();
        let s = evaluate(&m, EvaluationMethod::Sharpe, 0.0);
        assert_eq!(s.values, vec![0.0, 0.0]);
        assert_eq!(s.degenerate, vec![0, 1]);
    }

    #[test]
    fn infinite_observation_is_missing_under_sharpe_only() {
        let m = ObservationMatrix::from_columns(&[
            vec![0.01, 0.02, 0.03],
            vec![0.01, f64::INFINITY, 0.03],
        ])
        .unwrap();

        let sharpe = evaluate(&m, EvaluationMethod::Sharpe, 0.0);
        assert_eq!(sharpe.first_missing(), Some(1));
        assert!(sharpe.degenerate.is_empty());

        let average = evaluate(&m, EvaluationMethod::Average, 0.0);
        assert_eq!(average.values[1], f64::INFINITY);
        assert_eq!(average.first_missing(), None);
    }

    #[test]
    fn nan_propagates_as_missing_score() {
        let m = ObservationMatrix::from_columns(&[vec![1.0, 2.0], vec![f64::NAN, 1.0]]).unwrap();
        for method in [EvaluationMethod::Average, EvaluationMethod::Sharpe] {
            let s = evaluate(&m, method, 0.0);
            assert_eq!(s.first_missing(), Some(1));
            assert!(s.degenerate.is_empty());
        }
    }
}
