//! Observation matrix — rows are time periods, columns are strategies.
//!
//! Stored row-major so a contiguous run of periods is a contiguous slice of
//! the backing buffer. Blocks and train/validation matrices are built by
//! copying such slices in chronological order.

use crate::error::{CscvError, Result};

/// Per-period performance observations for a set of candidate strategies.
///
/// Missing observations are represented as `NaN`. They are accepted at
/// construction so that evaluation can report the exact combination and
/// column that hit them.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl ObservationMatrix {
    /// Build from a row-major buffer of `rows * cols` values.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(CscvError::InvalidMatrix(format!(
                "matrix must be non-empty, got {rows}x{cols}"
            )));
        }
        if data.len() != rows * cols {
            return Err(CscvError::InvalidMatrix(format!(
                "expected {} values for {rows}x{cols}, got {}",
                rows * cols,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from a list of rows (one `Vec` per time period).
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(CscvError::InvalidMatrix(format!(
                "row {i} has {} columns, expected {n_cols}",
                row.len()
            )));
        }
        let data = rows.into_iter().flatten().collect();
        Self::new(n_rows, n_cols, data)
    }

    /// Build from a list of columns (one `Vec` per strategy).
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Self> {
        let n_cols = columns.len();
        let n_rows = columns.first().map_or(0, Vec::len);
        if let Some((j, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != n_rows) {
            return Err(CscvError::InvalidMatrix(format!(
                "column {j} has {} rows, expected {n_rows}",
                col.len()
            )));
        }
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for r in 0..n_rows {
            data.extend(columns.iter().map(|c| c[r]));
        }
        Self::new(n_rows, n_cols, data)
    }

    /// Concatenate row ranges `[start, end)` of `self` in the order given.
    ///
    /// `None` if any range falls outside the matrix.
    pub(crate) fn stack_row_ranges(&self, ranges: &[(usize, usize)]) -> Option<Self> {
        let mut data = Vec::new();
        let mut total = 0;
        for &(start, end) in ranges {
            data.extend_from_slice(self.rows_slice(start, end)?);
            total += end - start;
        }
        Some(Self {
            rows: total,
            cols: self.cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of strategies.
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        self.rows_slice(row, row + 1)
    }

    /// Contiguous slice covering rows `[start, end)`, or `None` when the
    /// range is reversed or runs past the last row.
    pub fn rows_slice(&self, start: usize, end: usize) -> Option<&[f64]> {
        if start > end || end > self.rows {
            return None;
        }
        self.data.get(start * self.cols..end * self.cols)
    }

    /// Iterate over the values of one strategy column in time order.
    pub fn column(&self, col: usize) -> impl Iterator<Item = f64> + Clone + '_ {
        self.data.iter().skip(col).step_by(self.cols).copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Location `(row, col)` of the first `NaN` cell, scanning row by row.
    pub fn first_missing(&self) -> Option<(usize, usize)> {
        self.data
            .iter()
            .position(|v| v.is_nan())
            .map(|i| (i / self.cols, i % self.cols))
    }
}
