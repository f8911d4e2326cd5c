//! Hand-written row kernels used by `matfuse rowwise`.

use std::sync::Arc;

use matfuse_core::matrix::DenseBlock;
use matfuse_exec::primitives::{vect_add, vect_mult_write, vect_sum};
use matfuse_exec::{KernelError, RowEnv, RowKernel, RowType};

/// `X * s` (row-wise scale).
pub struct Scale;

impl RowKernel for Scale {
    fn exec_dense(
        &self,
        env: &mut RowEnv<'_>,
        a: &[f64],
        c: &mut [f64],
        ci: usize,
        _row: usize,
    ) -> Result<(), KernelError> {
        vect_mult_write(a, scalar(env), c, ci);
        Ok(())
    }

    fn exec_sparse(
        &self,
        env: &mut RowEnv<'_>,
        avals: &[f64],
        aix: &[usize],
        c: &mut [f64],
        ci: usize,
        _row: usize,
    ) -> Result<(), KernelError> {
        let s = scalar(env);
        c[ci..ci + env.n].fill(0.0);
        for (v, &j) in avals.iter().zip(aix) {
            c[ci + j] = v * s;
        }
        Ok(())
    }
}

/// `rowSums(X)`, `sum(X)` depending on the row type it is paired with.
pub struct Sum;

impl RowKernel for Sum {
    fn exec_dense(
        &self,
        _env: &mut RowEnv<'_>,
        a: &[f64],
        c: &mut [f64],
        ci: usize,
        _row: usize,
    ) -> Result<(), KernelError> {
        c[ci] += vect_sum(a);
        Ok(())
    }

    fn exec_sparse(
        &self,
        _env: &mut RowEnv<'_>,
        avals: &[f64],
        _aix: &[usize],
        c: &mut [f64],
        ci: usize,
        _row: usize,
    ) -> Result<(), KernelError> {
        c[ci] += vect_sum(avals);
        Ok(())
    }
}

/// `colSums(X)`.
pub struct ColSum;

impl RowKernel for ColSum {
    fn exec_dense(
        &self,
        _env: &mut RowEnv<'_>,
        a: &[f64],
        c: &mut [f64],
        ci: usize,
        _row: usize,
    ) -> Result<(), KernelError> {
        vect_add(a, c, ci);
        Ok(())
    }

    fn exec_sparse(
        &self,
        _env: &mut RowEnv<'_>,
        avals: &[f64],
        aix: &[usize],
        c: &mut [f64],
        ci: usize,
        _row: usize,
    ) -> Result<(), KernelError> {
        for (v, &j) in avals.iter().zip(aix) {
            c[ci + j] += v;
        }
        Ok(())
    }
}

fn scalar(env: &RowEnv<'_>) -> f64 {
    env.scalars.first().copied().unwrap_or(1.0)
}

/// Kernel for a row type, if a demo exists.
pub fn kernel_for(row_type: RowType) -> Option<Arc<dyn RowKernel>> {
    let k: Arc<dyn RowKernel> = match row_type {
        RowType::NoAgg => Arc::new(Scale),
        RowType::RowAgg | RowType::FullAgg => Arc::new(Sum),
        RowType::ColAgg | RowType::ColAggT => Arc::new(ColSum),
        _ => return None,
    };
    Some(k)
}

/// Deterministic `rows x cols` block with roughly `density` non-zeros.
pub fn synth_block(rows: usize, cols: usize, density: f64) -> DenseBlock {
    let mut d = DenseBlock::new(rows, cols);
    let keep = (density.clamp(0.0, 1.0) * 1000.0) as usize;
    for i in 0..rows {
        for j in 0..cols {
            let h = (i * 7919 + j * 104_729) % 1000;
            if h < keep {
                d.set(i, j, ((i + 2 * j) % 13) as f64 - 6.0);
            }
        }
    }
    d.recompute_nonzeros();
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demos_cover_basic_types() {
        assert!(kernel_for(RowType::RowAgg).is_some());
        assert!(kernel_for(RowType::ColAggB1).is_none());
    }

    #[test]
    fn synth_density_bounds() {
        assert_eq!(synth_block(10, 10, 0.0).non_zeros(), 0);
        let full = synth_block(10, 10, 1.0);
        assert!(full.non_zeros() > 80);
    }
}
