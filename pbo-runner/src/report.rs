//! Result of a CSCV run: the PBO plus every per-combination record.

use serde::{Deserialize, Serialize};

use pbo_core::{LambdaRecord, PboSummary};

use crate::config::CscvConfig;

/// Bumped whenever the serialized report layout changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete output of [`run_cscv`](crate::runner::run_cscv).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CscvReport {
    pub schema_version: u32,
    /// Probability of backtest overfitting.
    pub pbo: f64,
    /// Master seed actually used, so a run without a configured seed can be replayed.
    pub seed: u64,
    pub partitions: usize,
    pub n_rows: usize,
    pub n_strategies: usize,
    /// C(S, S/2).
    pub n_combinations: usize,
    /// Combinations dropped under `MissingValuePolicy::Skip`.
    pub skipped: usize,
    /// Combinations whose in-sample maximum was tied.
    pub tied_selections: usize,
    /// Total scores coerced to 0 for degenerate variance.
    pub degenerate_scores: usize,
    pub config: CscvConfig,
    pub summary: PboSummary,
    /// One record per evaluated combination, in enumeration order.
    pub records: Vec<LambdaRecord>,
}

impl CscvReport {
    pub fn lambdas(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.lambda).collect()
    }

    /// Number of combinations that contributed to the PBO.
    pub fn evaluated(&self) -> usize {
        self.records.len()
    }
}
