//! Row-major dense block.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dense row-major matrix block. Row `i` starts at `pos(i)` in `values`.
///
/// `nnz` is maintained explicitly: it is either the exact number of non-zero
/// cells or, right after an orientation flip, the conservative upper bound
/// `rows * cols` until `recompute_nonzeros` is called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseBlock {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
    nnz: u64,
}

impl DenseBlock {
    /// Zero-initialized `rows x cols` block.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![0.0; rows * cols],
            nnz: 0,
        }
    }

    /// Build from row-major values; nnz is counted.
    pub fn from_vec(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != rows * cols {
            return Err(Error::Shape(format!(
                "dense block {rows}x{cols} needs {} values, got {}",
                rows * cols,
                values.len()
            )));
        }
        let nnz = count_nonzeros(&values);
        Ok(Self {
            rows,
            cols,
            values,
            nnz,
        })
    }

    /// Build from nested rows (test and CLI convenience).
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(Error::Shape("ragged rows".into()));
        }
        let values = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Self::from_vec(rows.len(), cols, values)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Offset of row `i` in `values()`.
    #[inline]
    pub fn pos(&self, i: usize) -> usize {
        i * self.cols
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        let p = self.pos(i);
        &self.values[p..p + self.cols]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable access to the raw buffer. Callers that write through this
    /// must fix up `nnz` themselves (`recompute_nonzeros` / `set_non_zeros`).
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.cols + j]
    }

    pub fn set(&mut self, i: usize, j: usize, v: f64) {
        let idx = i * self.cols + j;
        let old = self.values[idx];
        if old == 0.0 && v != 0.0 {
            self.nnz += 1;
        } else if old != 0.0 && v == 0.0 {
            self.nnz = self.nnz.saturating_sub(1);
        }
        self.values[idx] = v;
    }

    /// Reshape to `rows x cols` and zero all cells.
    pub fn reset(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        self.values.clear();
        self.values.resize(rows * cols, 0.0);
        self.nnz = 0;
    }

    pub fn non_zeros(&self) -> u64 {
        self.nnz
    }

    pub fn set_non_zeros(&mut self, nnz: u64) {
        self.nnz = nnz;
    }

    /// Recount non-zeros over the whole block and store the result.
    pub fn recompute_nonzeros(&mut self) -> u64 {
        self.nnz = count_nonzeros(&self.values);
        self.nnz
    }

    /// Non-zeros in rows `[rl, ru)`.
    pub fn count_nonzeros_rows(&self, rl: usize, ru: usize) -> u64 {
        count_nonzeros(&self.values[self.pos(rl)..self.pos(ru)])
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Swap the dimension labels without moving data. After this the buffer
    /// is interpreted with the swapped row length, and nnz is set to the
    /// conservative `rows * cols`: the caller must recount.
    pub fn swap_dims_conservative(&mut self) {
        std::mem::swap(&mut self.rows, &mut self.cols);
        self.nnz = (self.rows * self.cols) as u64;
    }

    /// Physical transpose into a new block. nnz is carried over as-is, so a
    /// conservative count stays conservative.
    pub fn transpose(&self) -> DenseBlock {
        let mut out = vec![0.0; self.values.len()];
        for i in 0..self.rows {
            let row = self.row(i);
            for (j, v) in row.iter().enumerate() {
                out[j * self.rows + i] = *v;
            }
        }
        DenseBlock {
            rows: self.cols,
            cols: self.rows,
            values: out,
            nnz: self.nnz,
        }
    }

    /// Cell-wise comparison with a relative tolerance.
    pub fn approx_eq(&self, other: &DenseBlock, rel_tol: f64) -> bool {
        if self.rows != other.rows || self.cols != other.cols {
            return false;
        }
        self.values.iter().zip(&other.values).all(|(a, b)| {
            let scale = a.abs().max(b.abs()).max(1.0);
            (a - b).abs() <= rel_tol * scale
        })
    }
}

/// Number of non-zero entries in a slice.
pub fn count_nonzeros(values: &[f64]) -> u64 {
    values.iter().filter(|v| **v != 0.0).count() as u64
}
