//! Data characteristics: dimensions, block sizes, and non-zero counts.
//!
//! Any of the sizes may be unknown at compile time (e.g. the output of a
//! data-dependent operator). Unknown is modelled as `None`, never as a
//! negative sentinel.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataCharacteristics {
    pub rows: Option<u64>,
    pub cols: Option<u64>,
    pub rows_in_block: u32,
    pub cols_in_block: u32,
    pub nnz: Option<u64>,
}

impl DataCharacteristics {
    pub fn new(rows: u64, cols: u64, block_size: u32, nnz: Option<u64>) -> Self {
        Self {
            rows: Some(rows),
            cols: Some(cols),
            rows_in_block: block_size,
            cols_in_block: block_size,
            nnz,
        }
    }

    /// Characteristics with unknown dims and nnz.
    pub fn unknown(block_size: u32) -> Self {
        Self {
            rows: None,
            cols: None,
            rows_in_block: block_size,
            cols_in_block: block_size,
            nnz: None,
        }
    }

    pub fn dims_known(&self) -> bool {
        self.rows.is_some() && self.cols.is_some()
    }

    pub fn nnz_known(&self) -> bool {
        self.nnz.is_some()
    }

    /// Both dims, if known.
    pub fn dims(&self) -> Option<(u64, u64)> {
        Some((self.rows?, self.cols?))
    }

    /// Known row or column vector.
    pub fn is_vector(&self) -> bool {
        matches!(self.dims(), Some((r, c)) if r == 1 || c == 1)
    }

    pub fn cells(&self) -> Option<u64> {
        self.dims().map(|(r, c)| r.saturating_mul(c))
    }

    /// Fraction of non-zero cells; `None` if dims or nnz are unknown.
    pub fn sparsity(&self) -> Option<f64> {
        let cells = self.cells()?;
        let nnz = self.nnz?;
        if cells == 0 {
            return Some(0.0);
        }
        Some(nnz as f64 / cells as f64)
    }

    pub fn set_dims(&mut self, rows: Option<u64>, cols: Option<u64>) {
        self.rows = rows;
        self.cols = cols;
    }
}
