//! Sparse block in compressed-row form.
//!
//! Row `i` owns `values[pos(i)..pos(i) + size(i)]` with matching column
//! indices in `indexes`, sorted ascending. Rows may be empty.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matrix::dense::DenseBlock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseBlock {
    rows: usize,
    cols: usize,
    row_ptr: Vec<usize>,
    indexes: Vec<usize>,
    values: Vec<f64>,
}

impl SparseBlock {
    /// Empty `rows x cols` block (every row empty).
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            row_ptr: vec![0; rows + 1],
            indexes: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn new(
        rows: usize,
        cols: usize,
        row_ptr: Vec<usize>,
        indexes: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self> {
        if row_ptr.len() != rows + 1 {
            return Err(Error::Shape(format!(
                "row_ptr must have {} entries, got {}",
                rows + 1,
                row_ptr.len()
            )));
        }
        if indexes.len() != values.len() || row_ptr[rows] != values.len() {
            return Err(Error::Shape("row_ptr/indexes/values disagree".into()));
        }
        if row_ptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::Shape("row_ptr must be non-decreasing".into()));
        }
        if let Some(&c) = indexes.iter().find(|&&c| c >= cols) {
            return Err(Error::Shape(format!(
                "column index {c} out of bounds (cols = {cols})"
            )));
        }
        for (i, w) in row_ptr.windows(2).enumerate() {
            if indexes[w[0]..w[1]].windows(2).any(|p| p[0] >= p[1]) {
                return Err(Error::Shape(format!(
                    "column indexes of row {i} must be strictly ascending"
                )));
            }
        }
        Ok(Self {
            rows,
            cols,
            row_ptr,
            indexes,
            values,
        })
    }

    /// Drop explicit zeros from a dense block.
    pub fn from_dense(d: &DenseBlock) -> Self {
        let mut row_ptr = Vec::with_capacity(d.rows() + 1);
        let mut indexes = Vec::with_capacity(d.non_zeros() as usize);
        let mut values = Vec::with_capacity(d.non_zeros() as usize);
        row_ptr.push(0);
        for i in 0..d.rows() {
            for (j, v) in d.row(i).iter().enumerate() {
                if *v != 0.0 {
                    indexes.push(j);
                    values.push(*v);
                }
            }
            row_ptr.push(values.len());
        }
        Self {
            rows: d.rows(),
            cols: d.cols(),
            row_ptr,
            indexes,
            values,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn nnz(&self) -> u64 {
        self.values.len() as u64
    }

    #[inline]
    pub fn is_empty_row(&self, i: usize) -> bool {
        self.row_ptr[i] == self.row_ptr[i + 1]
    }

    /// Offset of row `i` inside `values()`/`indexes()`.
    #[inline]
    pub fn pos(&self, i: usize) -> usize {
        self.row_ptr[i]
    }

    /// Number of stored entries in row `i`.
    #[inline]
    pub fn size(&self, i: usize) -> usize {
        self.row_ptr[i + 1] - self.row_ptr[i]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn indexes(&self) -> &[usize] {
        &self.indexes
    }

    /// Stored values and column indexes of row `i`.
    pub fn row(&self, i: usize) -> (&[f64], &[usize]) {
        let (s, e) = (self.row_ptr[i], self.row_ptr[i + 1]);
        (&self.values[s..e], &self.indexes[s..e])
    }

    pub fn nnz_rows(&self, rl: usize, ru: usize) -> u64 {
        (self.row_ptr[ru] - self.row_ptr[rl]) as u64
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (vals, ix) = self.row(i);
        match ix.binary_search(&j) {
            Ok(k) => vals[k],
            Err(_) => 0.0,
        }
    }

    pub fn to_dense(&self) -> DenseBlock {
        let mut d = DenseBlock::new(self.rows, self.cols);
        {
            let out = d.values_mut();
            for i in 0..self.rows {
                let (vals, ix) = self.row(i);
                for (v, j) in vals.iter().zip(ix) {
                    out[i * self.cols + j] = *v;
                }
            }
        }
        d.recompute_nonzeros();
        d
    }

    /// Transposed copy (used for transposed side inputs).
    pub fn transpose(&self) -> SparseBlock {
        let mut counts = vec![0usize; self.cols + 1];
        for &j in &self.indexes {
            counts[j + 1] += 1;
        }
        for j in 0..self.cols {
            counts[j + 1] += counts[j];
        }
        let row_ptr = counts.clone();
        let mut next = counts;
        let mut indexes = vec![0; self.values.len()];
        let mut values = vec![0.0; self.values.len()];
        for i in 0..self.rows {
            let (vals, ix) = self.row(i);
            for (v, &j) in vals.iter().zip(ix) {
                let k = next[j];
                indexes[k] = i;
                values[k] = *v;
                next[j] += 1;
            }
        }
        SparseBlock {
            rows: self.cols,
            cols: self.rows,
            row_ptr,
            indexes,
            values,
        }
    }
}
