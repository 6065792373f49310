//! CSCV run orchestration.
//!
//! Streams combinations in batches of `batch_size`. Each batch is processed
//! on a dedicated Rayon pool (or inline for a single thread); every worker
//! builds its own train/validation matrices from the shared read-only
//! observation matrix and drops them once the lambda record is computed.
//! Peak memory is bounded by one batch of pairs.
//!
//! Results are collected in enumeration order and tie-breaks come from a
//! per-combination RNG, so a seeded run is identical for any thread count
//! and batch size.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use pbo_core::{
    build_pair, combination_count, enumerate, lambda_for_pair, partition, CombinationIndex,
    CombinationRng, CscvError, LambdaRecord, ObservationMatrix, PboSummary,
};

use crate::config::{ConfigError, CscvConfig, MissingValuePolicy};
use crate::report::{CscvReport, SCHEMA_VERSION};

/// Progress snapshot passed to the callback after each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CscvProgress {
    /// Combinations processed so far, skipped ones included.
    pub completed: usize,
    pub total: usize,
    pub skipped: usize,
}

/// Errors from a CSCV run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cscv(#[from] CscvError),
    #[error("too many combinations to index for {partitions} partitions")]
    TooManyCombinations { partitions: usize },
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
    #[error("run cancelled after {completed} of {total} combinations")]
    Cancelled { completed: usize, total: usize },
}

/// Outcome of one combination inside a batch.
enum Outcome {
    Done(LambdaRecord),
    Failed(CscvError),
    Cancelled,
}

/// Run the full CSCV pipeline on `matrix`.
///
/// # Arguments
/// - `matrix`: observations, rows in time order, one column per strategy.
/// - `config`: partition count, scoring method, tie policies, threading.
/// - `progress`: optional callback invoked after every batch.
/// - `cancel`: optional flag checked before each combination; when set the
///   run stops and returns [`RunError::Cancelled`].
pub fn run_cscv(
    matrix: &ObservationMatrix,
    config: &CscvConfig,
    progress: Option<&(dyn Fn(&CscvProgress) + Sync)>,
    cancel: Option<&AtomicBool>,
) -> Result<CscvReport, RunError> {
    config.validate()?;

    let blocks = partition(matrix, config.partitions, config.partition_policy)?;
    let total = combination_count(config.partitions)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or(RunError::TooManyCombinations {
            partitions: config.partitions,
        })?;

    // drawn seeds stay within a TOML integer so they can be written back as-is
    let seed = config.seed.unwrap_or_else(|| rand::random::<u64>() >> 1);
    let rng = CombinationRng::new(seed);
    let params = config.lambda_params();

    info!(
        partitions = config.partitions,
        combinations = total,
        rows = matrix.rows(),
        strategies = matrix.cols(),
        method = %config.method,
        threads = config.threads,
        seed,
        "starting CSCV run"
    );

    let pool = if config.threads > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build()
                .map_err(|e| RunError::ThreadPool(e.to_string()))?,
        )
    } else {
        None
    };

    let is_cancelled = || cancel.is_some_and(|f| f.load(Ordering::Relaxed));

    let process = |(index, combination): &(usize, CombinationIndex)| -> Outcome {
        if is_cancelled() {
            return Outcome::Cancelled;
        }
        let record = build_pair(matrix, &blocks, *index, combination)
            .and_then(|pair| lambda_for_pair(&pair, &params, &rng));
        match record {
            Ok(record) => Outcome::Done(record),
            Err(e) => Outcome::Failed(e),
        }
    };

    let mut combinations = enumerate(config.partitions)?.enumerate();
    let mut records: Vec<LambdaRecord> = Vec::with_capacity(total.min(config.batch_size));
    let mut skipped = 0usize;

    loop {
        let batch: Vec<(usize, CombinationIndex)> =
            combinations.by_ref().take(config.batch_size).collect();
        if batch.is_empty() {
            break;
        }

        let outcomes: Vec<Outcome> = match &pool {
            Some(tp) => tp.install(|| batch.par_iter().map(&process).collect()),
            None => batch.iter().map(&process).collect(),
        };

        for outcome in outcomes {
            match outcome {
                Outcome::Done(record) => records.push(record),
                Outcome::Failed(CscvError::MissingValue {
                    combination,
                    column,
                    side,
                }) if config.missing_values == MissingValuePolicy::Skip => {
                    warn!(combination, column, %side, "missing value, combination skipped");
                    skipped += 1;
                }
                Outcome::Failed(e) => return Err(e.into()),
                Outcome::Cancelled => {
                    info!(completed = records.len() + skipped, total, "CSCV run cancelled");
                    return Err(RunError::Cancelled {
                        completed: records.len() + skipped,
                        total,
                    });
                }
            }
        }

        let snapshot = CscvProgress {
            completed: records.len() + skipped,
            total,
            skipped,
        };
        debug!(completed = snapshot.completed, total, "batch finished");
        if let Some(cb) = progress {
            cb(&snapshot);
        }
    }

    let summary = PboSummary::from_records(&records)?;
    let tied_selections = records.iter().filter(|r| r.tied_best > 1).count();
    let degenerate_scores = records.iter().map(|r| r.degenerate_scores).sum();

    info!(
        pbo = summary.pbo,
        evaluated = records.len(),
        skipped,
        tied_selections,
        "CSCV run finished"
    );

    Ok(CscvReport {
        schema_version: SCHEMA_VERSION,
        pbo: summary.pbo,
        seed,
        partitions: config.partitions,
        n_rows: matrix.rows(),
        n_strategies: matrix.cols(),
        n_combinations: total,
        skipped,
        tied_selections,
        degenerate_scores,
        config: config.clone(),
        summary,
        records,
    })
}

/// Convenience wrapper returning only the probability.
pub fn estimate_pbo(matrix: &ObservationMatrix, config: &CscvConfig) -> Result<f64, RunError> {
    run_cscv(matrix, config, None, None).map(|report| report.pbo)
}
