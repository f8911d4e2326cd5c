//! Physical matrix representations.
//!
//! The representation is chosen independently of the algebra: every kernel
//! must produce the same result whether its primary input is dense, sparse,
//! or compressed.

pub mod compressed;
pub mod dense;
pub mod sparse;

pub use compressed::{ColGroup, CompressedBlock, DenseRowCursor};
pub use dense::{count_nonzeros, DenseBlock};
pub use sparse::SparseBlock;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatrixBlock {
    Dense(DenseBlock),
    Sparse(SparseBlock),
    Compressed(CompressedBlock),
}

impl MatrixBlock {
    pub fn rows(&self) -> usize {
        match self {
            MatrixBlock::Dense(d) => d.rows(),
            MatrixBlock::Sparse(s) => s.rows(),
            MatrixBlock::Compressed(c) => c.rows(),
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            MatrixBlock::Dense(d) => d.cols(),
            MatrixBlock::Sparse(s) => s.cols(),
            MatrixBlock::Compressed(c) => c.cols(),
        }
    }

    pub fn nnz(&self) -> u64 {
        match self {
            MatrixBlock::Dense(d) => d.non_zeros(),
            MatrixBlock::Sparse(s) => s.nnz(),
            MatrixBlock::Compressed(c) => c.nnz(),
        }
    }

    pub fn cells(&self) -> u64 {
        self.rows() as u64 * self.cols() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.nnz() == 0
    }

    pub fn is_vector(&self) -> bool {
        self.rows() == 1 || self.cols() == 1
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, MatrixBlock::Sparse(_))
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, MatrixBlock::Compressed(_))
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        match self {
            MatrixBlock::Dense(d) => d.get(i, j),
            MatrixBlock::Sparse(s) => s.get(i, j),
            MatrixBlock::Compressed(c) => c.get(i, j),
        }
    }

    pub fn to_dense(&self) -> DenseBlock {
        match self {
            MatrixBlock::Dense(d) => d.clone(),
            MatrixBlock::Sparse(s) => s.to_dense(),
            MatrixBlock::Compressed(c) => c.decompress(),
        }
    }

    pub fn to_sparse(&self) -> SparseBlock {
        match self {
            MatrixBlock::Sparse(s) => s.clone(),
            other => SparseBlock::from_dense(&other.to_dense()),
        }
    }
}

impl From<DenseBlock> for MatrixBlock {
    fn from(d: DenseBlock) -> Self {
        MatrixBlock::Dense(d)
    }
}

impl From<SparseBlock> for MatrixBlock {
    fn from(s: SparseBlock) -> Self {
        MatrixBlock::Sparse(s)
    }
}

impl From<CompressedBlock> for MatrixBlock {
    fn from(c: CompressedBlock) -> Self {
        MatrixBlock::Compressed(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn representations_agree_on_cells() {
        let d = DenseBlock::from_rows(&[vec![1.0, 0.0, 3.0], vec![0.0, 5.0, 0.0]]).unwrap();
        let blocks = [
            MatrixBlock::from(d.clone()),
            MatrixBlock::from(SparseBlock::from_dense(&d)),
            MatrixBlock::from(CompressedBlock::compress(&d, 2).unwrap()),
        ];
        for b in &blocks {
            assert_eq!((b.rows(), b.cols()), (2, 3));
            assert_eq!(b.nnz(), 3);
            assert_eq!(b.get(1, 1), 5.0);
            assert_eq!(b.to_dense().values(), d.values());
        }
    }
}
