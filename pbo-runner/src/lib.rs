//! PBO Runner — CSCV run orchestration, configuration, and report export.
//!
//! This crate builds on `pbo-core` to provide:
//! - TOML-backed run configuration with validation
//! - Batched, optionally parallel CSCV runs with progress and cancellation
//! - Run reports carrying the PBO, the seed used, and every lambda record
//! - JSON and CSV export

pub mod config;
pub mod export;
pub mod report;
pub mod runner;

pub use config::{ConfigError, CscvConfig, MissingValuePolicy};
pub use export::{export_json, export_records_csv, save_artifacts};
pub use report::{CscvReport, SCHEMA_VERSION};
pub use runner::{estimate_pbo, run_cscv, CscvProgress, RunError};
