//! Report export: JSON for the full run, CSV for the per-combination records.
//!
//! JSON has no representation for infinity, so infinite lambdas (w̄ = 1)
//! serialize as `null`. The CSV keeps them as `inf` / `-inf`.

use std::path::Path;

use anyhow::{Context, Result};
use pbo_core::LambdaRecord;

use crate::report::CscvReport;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a report to pretty JSON.
pub fn export_json(report: &CscvReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize CscvReport to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export lambda records as CSV, one row per combination.
///
/// Columns: combination, best_index, tied_best, rank, relative_rank, lambda,
/// is_score, oos_score, kendall_tau, spearman_rho, degenerate_scores.
/// Undefined correlations are written as empty fields.
pub fn export_records_csv(records: &[LambdaRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "combination",
        "best_index",
        "tied_best",
        "rank",
        "relative_rank",
        "lambda",
        "is_score",
        "oos_score",
        "kendall_tau",
        "spearman_rho",
        "degenerate_scores",
    ])?;

    let opt = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();

    for r in records {
        wtr.write_record([
            r.combination.to_string(),
            r.best_index.to_string(),
            r.tied_best.to_string(),
            format!("{:.1}", r.rank),
            format!("{:.6}", r.relative_rank),
            format!("{:.6}", r.lambda),
            format!("{:.8}", r.is_score),
            format!("{:.8}", r.oos_score),
            opt(r.kendall_tau),
            opt(r.spearman_rho),
            r.degenerate_scores.to_string(),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

// ─── Artifacts ──────────────────────────────────────────────────────

/// Write `report.json` and `lambdas.csv` into `dir`, creating it if needed.
pub fn save_artifacts(report: &CscvReport, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let json_path = dir.join("report.json");
    std::fs::write(&json_path, export_json(report)?)
        .with_context(|| format!("failed to write {}", json_path.display()))?;

    let csv_path = dir.join("lambdas.csv");
    std::fs::write(&csv_path, export_records_csv(&report.records)?)
        .with_context(|| format!("failed to write {}", csv_path.display()))?;

    Ok(())
}
