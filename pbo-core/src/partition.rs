//! Partitioner — splits the time axis into S contiguous blocks.
//!
//! Block size is `rows / S` (integer division). With the default
//! [`PartitionPolicy::AbsorbRemainder`] the last block takes the leftover
//! rows; with [`PartitionPolicy::Exact`] a remainder is an error.

use serde::{Deserialize, Serialize};

use crate::error::{CscvError, Result};
use crate::matrix::ObservationMatrix;

/// How to handle a row count that is not a multiple of S.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionPolicy {
    /// All blocks get `rows / S` rows, the last one also gets the remainder.
    #[default]
    AbsorbRemainder,
    /// Fail with `NonDivisibleRowCount` unless `rows % S == 0`.
    Exact,
}

/// A contiguous row range `[start, end)` of the observation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: usize,
    /// First row (inclusive).
    pub start: usize,
    /// Last row (exclusive).
    pub end: usize,
}

impl Block {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Read-only view of the block's rows in the source matrix, or `None`
    /// if the block does not fit it.
    pub fn view<'a>(&self, matrix: &'a ObservationMatrix) -> Option<&'a [f64]> {
        matrix.rows_slice(self.start, self.end)
    }
}

/// Compute block boundaries for `rows` rows and `partitions` blocks.
pub fn block_bounds(rows: usize, partitions: usize, policy: PartitionPolicy) -> Result<Vec<Block>> {
    if partitions == 0 || partitions > rows {
        return Err(CscvError::InvalidPartitionCount { partitions, rows });
    }
    if policy == PartitionPolicy::Exact && rows % partitions != 0 {
        return Err(CscvError::NonDivisibleRowCount { partitions, rows });
    }

    let size = rows / partitions;
    let blocks = (0..partitions)
        .map(|index| {
            let start = index * size;
            let end = if index + 1 == partitions {
                rows
            } else {
                start + size
            };
            Block { index, start, end }
        })
        .collect();

    Ok(blocks)
}

/// Split `matrix` into `partitions` contiguous blocks in time order.
pub fn partition(
    matrix: &ObservationMatrix,
    partitions: usize,
    policy: PartitionPolicy,
) -> Result<Vec<Block>> {
    block_bounds(matrix.rows(), partitions, policy)
}
