//! Error taxonomy for the CSCV pipeline.
//!
//! Only fatal conditions live here. Degenerate variance and tied in-sample
//! maxima are recoverable: they are logged and counted on the records.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which half of a train/validation pair a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairSide {
    Train,
    Validation,
}

impl fmt::Display for PairSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairSide::Train => write!(f, "train"),
            PairSide::Validation => write!(f, "validation"),
        }
    }
}

/// Errors raised by the CSCV pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CscvError {
    #[error("invalid partition count {partitions} for {rows} rows")]
    InvalidPartitionCount { partitions: usize, rows: usize },

    #[error("{rows} rows are not divisible into {partitions} equal blocks")]
    NonDivisibleRowCount { partitions: usize, rows: usize },

    #[error("partition count {partitions} is odd: a balanced split needs an even count")]
    OddPartitionCount { partitions: usize },

    #[error("unknown evaluation method '{0}' (expected 'average' or 'sharpe')")]
    UnknownEvaluationMethod(String),

    #[error("missing value in combination {combination}, strategy column {column} ({side} matrix)")]
    MissingValue {
        combination: usize,
        column: usize,
        side: PairSide,
    },

    #[error("cannot aggregate an empty lambda sequence")]
    EmptyInput,

    #[error("invalid combination {selected:?} of {partitions} blocks")]
    InvalidCombination {
        partitions: usize,
        selected: Vec<usize>,
    },

    #[error("invalid matrix: {0}")]
    InvalidMatrix(String),

    #[error("score vectors differ in length: {left} vs {right}")]
    ShapeMismatch { left: usize, right: usize },
}

pub type Result<T> = std::result::Result<T, CscvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_value_message_names_combination_and_column() {
        let err = CscvError::MissingValue {
            combination: 7,
            column: 3,
            side: PairSide::Validation,
        };
        let msg = err.to_string();
        assert!(msg.contains("combination 7"));
        assert!(msg.contains("column 3"));
        assert!(msg.contains("validation"));
    }
}
