//! Lambda calculator — relative out-of-sample rank logit per combination.
//!
//! For each train/validation pair:
//! 1. Score every strategy in-sample (R) and out-of-sample (R̄).
//! 2. Pick n* = argmax R, breaking ties with the selection policy.
//! 3. Rank R̄[n*] among R̄ (1 = lowest) with the rank tie policy.
//! 4. w̄ = rank / N and λ = ln(w̄ / (1 - w̄)).
//!
//! w̄ is never 0 since rank >= 1. w̄ = 1 (n* ranked best out-of-sample) gives
//! λ = +∞, which is a valid outcome and counts as not overfit.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::combinations::TrainValPair;
use crate::error::{CscvError, PairSide, Result};
use crate::evaluate::{evaluate, EvaluationMethod, Scores, DEFAULT_RISK_FREE_RATE};
use crate::rank::{kendall_tau, rank_of, select_best, spearman, RankTieBreak, SelectionTieBreak};
use crate::rng::CombinationRng;

/// Scoring and tie-break settings shared by every combination of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LambdaParams {
    pub method: EvaluationMethod,
    pub risk_free_rate: f64,
    pub selection_ties: SelectionTieBreak,
    pub rank_ties: RankTieBreak,
}

impl Default for LambdaParams {
    fn default() -> Self {
        Self {
            method: EvaluationMethod::Average,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            selection_ties: SelectionTieBreak::Random,
            rank_ties: RankTieBreak::Random,
        }
    }
}

/// Outcome of one combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaRecord {
    /// Combination index in enumeration order.
    pub combination: usize,
    /// Selected in-sample best strategy (n*).
    pub best_index: usize,
    /// Number of columns that tied for the in-sample maximum.
    pub tied_best: usize,
    /// Out-of-sample rank of n*, 1 = lowest.
    pub rank: f64,
    /// w̄ = rank / N, in (0, 1].
    pub relative_rank: f64,
    /// logit(w̄); `+inf` when n* ranks best out-of-sample.
    pub lambda: f64,
    pub is_score: f64,
    pub oos_score: f64,
    /// Kendall tau-b between R and R̄, `None` when undefined.
    pub kendall_tau: Option<f64>,
    /// Spearman rho between R and R̄, `None` when undefined.
    pub spearman_rho: Option<f64>,
    /// Columns coerced to 0 for degenerate variance, both sides combined.
    pub degenerate_scores: usize,
}

impl LambdaRecord {
    /// λ <= 0: n* performed at or below the out-of-sample median.
    pub fn is_overfit(&self) -> bool {
        self.lambda <= 0.0
    }
}

/// Logit of a relative rank.
pub fn logit(w: f64) -> f64 {
    (w / (1.0 - w)).ln()
}

fn check_missing(scores: &Scores, combination: usize, side: PairSide) -> Result<()> {
    match scores.first_missing() {
        Some(column) => Err(CscvError::MissingValue {
            combination,
            column,
            side,
        }),
        None => Ok(()),
    }
}

/// Compute the lambda record for one pair.
///
/// Randomness comes from the combination's own stream, so the result does not
/// depend on which worker processes the pair or in what order.
pub fn lambda_for_pair(
    pair: &TrainValPair,
    params: &LambdaParams,
    rng: &CombinationRng,
) -> Result<LambdaRecord> {
    let combination = pair.index;
    let in_sample = evaluate(&pair.train, params.method, params.risk_free_rate);
    let out_sample = evaluate(&pair.validation, params.method, params.risk_free_rate);

    check_missing(&in_sample, combination, PairSide::Train)?;
    check_missing(&out_sample, combination, PairSide::Validation)?;

    let n = in_sample.values.len();
    if n != out_sample.values.len() {
        return Err(CscvError::ShapeMismatch {
            left: n,
            right: out_sample.values.len(),
        });
    }

    let degenerate_scores = in_sample.degenerate.len() + out_sample.degenerate.len();
    if degenerate_scores > 0 {
        warn!(
            combination,
            train = ?in_sample.degenerate,
            validation = ?out_sample.degenerate,
            "degenerate variance, scores coerced to 0"
        );
    }

    let mut stream = rng.rng_for(combination);
    let selection = select_best(&in_sample.values, params.selection_ties, &mut stream)
        .ok_or_else(|| CscvError::InvalidMatrix("no strategy columns".into()))?;
    if selection.tied > 1 {
        warn!(
            combination,
            tied = selection.tied,
            chosen = selection.index,
            "tied in-sample maximum"
        );
    }

    let best = selection.index;
    let rank = rank_of(&out_sample.values, best, params.rank_ties, &mut stream);
    let relative_rank = rank / n as f64;
    let lambda = logit(relative_rank);

    debug!(combination, best, rank, lambda, "combination evaluated");

    Ok(LambdaRecord {
        combination,
        best_index: best,
        tied_best: selection.tied,
        rank,
        relative_rank,
        lambda,
        is_score: in_sample.values[best],
        oos_score: out_sample.values[best],
        kendall_tau: kendall_tau(&in_sample.values, &out_sample.values),
        spearman_rho: spearman(&in_sample.values, &out_sample.values),
        degenerate_scores,
    })
}

/// Compute lambda records for a stream of pairs, in input order.
///
/// Fails on the first error, including errors produced while building pairs.
pub fn compute_lambdas<I>(
    pairs: I,
    params: &LambdaParams,
    rng: &CombinationRng,
) -> Result<Vec<LambdaRecord>>
where
    I: IntoIterator<Item = Result<TrainValPair>>,
{
    pairs
        .into_iter()
        .map(|pair| lambda_for_pair(&pair?, params, rng))
        .collect()
}
