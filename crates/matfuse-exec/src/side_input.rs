//! Side inputs: auxiliary operands prepared once per kernel call.
//!
//! Dense and sparse blocks are borrowed as-is. Compressed blocks are
//! decompressed, and the first side input is transposed when the operator
//! consumes B1 transposed; both produce an owned copy for the duration of
//! the call.

use std::borrow::Cow;

use matfuse_core::matrix::{DenseBlock, MatrixBlock, SparseBlock};

#[derive(Debug, Clone)]
pub enum SideInput<'a> {
    Dense(Cow<'a, DenseBlock>),
    Sparse(Cow<'a, SparseBlock>),
}

impl<'a> SideInput<'a> {
    /// Wrap `block`, transposing it if `transpose` is set.
    pub fn prepare(block: &'a MatrixBlock, transpose: bool) -> Self {
        match (block, transpose) {
            (MatrixBlock::Dense(d), false) => SideInput::Dense(Cow::Borrowed(d)),
            (MatrixBlock::Dense(d), true) => SideInput::Dense(Cow::Owned(d.transpose())),
            (MatrixBlock::Sparse(s), false) => SideInput::Sparse(Cow::Borrowed(s)),
            (MatrixBlock::Sparse(s), true) => SideInput::Sparse(Cow::Owned(s.transpose())),
            (MatrixBlock::Compressed(c), false) => SideInput::Dense(Cow::Owned(c.decompress())),
            (MatrixBlock::Compressed(c), true) => {
                SideInput::Dense(Cow::Owned(c.decompress().transpose()))
            }
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            SideInput::Dense(d) => d.rows(),
            SideInput::Sparse(s) => s.rows(),
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            SideInput::Dense(d) => d.cols(),
            SideInput::Sparse(s) => s.cols(),
        }
    }

    /// Random access.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        match self {
            SideInput::Dense(d) => d.get(i, j),
            SideInput::Sparse(s) => s.get(i, j),
        }
    }

    /// Contiguous row slice, for dense side inputs only.
    pub fn dense_row(&self, i: usize) -> Option<&[f64]> {
        match self {
            SideInput::Dense(d) => Some(d.row(i)),
            SideInput::Sparse(_) => None,
        }
    }

    /// All values in row-major order (dense vectors are read this way).
    pub fn dense_values(&self) -> Option<&[f64]> {
        match self {
            SideInput::Dense(d) => Some(d.values()),
            SideInput::Sparse(_) => None,
        }
    }

    /// Write row `i` densely into `buf` (length `cols`).
    pub fn row_into(&self, i: usize, buf: &mut [f64]) {
        match self {
            SideInput::Dense(d) => buf.copy_from_slice(d.row(i)),
            SideInput::Sparse(s) => {
                buf.fill(0.0);
                let (vals, ix) = s.row(i);
                for (v, &j) in vals.iter().zip(ix) {
                    buf[j] = *v;
                }
            }
        }
    }
}

/// Prepare `inputs[1..]`; the first side input is transposed if `transpose_b1`.
pub fn prepare_side_inputs<'a>(
    inputs: &[&'a MatrixBlock],
    transpose_b1: bool,
) -> Vec<SideInput<'a>> {
    inputs
        .iter()
        .skip(1)
        .enumerate()
        .map(|(k, b)| SideInput::prepare(*b, transpose_b1 && k == 0))
        .collect()
}

/// Any side input with more than one column.
pub fn has_matrix_side_input(inputs: &[&MatrixBlock]) -> bool {
    inputs.iter().skip(1).any(|b| b.cols() > 1)
}

/// Smallest column count among matrix-shaped side inputs, or 1 if none.
pub fn min_cols_matrix_side_inputs(inputs: &[&MatrixBlock]) -> usize {
    inputs
        .iter()
        .skip(1)
        .map(|b| b.cols())
        .filter(|&c| c > 1)
        .min()
        .unwrap_or(1)
}
