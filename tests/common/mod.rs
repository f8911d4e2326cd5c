//! Shared kernels and data generators for integration tests.
//!
//! Every kernel pairs with one row type and has a naive reference that
//! computes the same result without the fused operator.

#![allow(dead_code)]

use std::sync::Arc;

use matfuse_core::config::ExecConfig;
use matfuse_core::matrix::{CompressedBlock, DenseBlock, MatrixBlock, SparseBlock};
use matfuse_exec::primitives::{
    dot_product, dot_product_sparse, vect_mult_add, vect_mult_add_sparse,
    vect_mult_write, vect_outer_mult_add, vect_outer_mult_add_sparse, vect_sum,
    vect_write_sparse,
};
use matfuse_exec::{FusedRowwise, KernelError, RowEnv, RowKernel, RowType};

pub const CONST_DIM2: usize = 3;

/// Deterministic `rows x cols` block; roughly `density` of the cells are
/// non-zero.
pub fn gen_dense(rows: usize, cols: usize, density: f64, seed: u64) -> DenseBlock {
    let mut d = DenseBlock::new(rows, cols);
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    for i in 0..rows {
        for j in 0..cols {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let u = (state >> 33) as f64 / (1u64 << 31) as f64;
            if u < density {
                let v = ((state >> 11) % 19) as f64 - 9.0;
                d.set(i, j, if v == 0.0 { 0.5 } else { v * 0.25 });
            }
        }
    }
    d.recompute_nonzeros();
    d
}

/// The same block in all three representations.
pub fn representations(d: &DenseBlock) -> Vec<MatrixBlock> {
    vec![
        MatrixBlock::from(d.clone()),
        MatrixBlock::from(SparseBlock::from_dense(d)),
        MatrixBlock::from(CompressedBlock::compress(d, 2).unwrap()),
    ]
}

/// Parallel execution even for tiny inputs, on up to 8 threads regardless
/// of the host's core count.
pub fn eager_parallel_config() -> ExecConfig {
    ExecConfig {
        par_numcell_threshold: 1,
        max_parallel_tasks: 8,
        ..ExecConfig::default()
    }
}

/// Row `row` of the first side input, which must be dense.
fn side_row<'a>(env: &RowEnv<'a>, row: usize) -> Result<&'a [f64], KernelError> {
    env.side(0)?.dense_row(row).ok_or(KernelError::Row {
        row,
        msg: "dense side input expected".into(),
    })
}

/// `X * s`.
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
        vect_mult_write(a, env.scalars[0], c, ci);
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
        vect_write_sparse(avals, aix, env.n, c, ci);
        for v in &mut c[ci..ci + env.n] {
            *v *= env.scalars[0];
        }
        Ok(())
    }
}

/// `X %*% B` with `B` an `n x n2` side input.
pub struct TimesB1;

impl RowKernel for TimesB1 {
    fn exec_dense(
        &self,
        env: &mut RowEnv<'_>,
        a: &[f64],
        c: &mut [f64],
        ci: usize,
        _row: usize,
    ) -> Result<(), KernelError> {
        let b = env.side(0)?;
        let n2 = b.cols();
        for (j, av) in a.iter().enumerate() {
            if *av != 0.0 {
                for k in 0..n2 {
                    c[ci + k] += av * b.get(j, k);
                }
            }
        }
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
        let b = env.side(0)?;
        for (av, &j) in avals.iter().zip(aix) {
            for k in 0..b.cols() {
                c[ci + k] += av * b.get(j, k);
            }
        }
        Ok(())
    }
}

/// Row sum spread over `CONST_DIM2` columns, `k`-th scaled by `k + 1`.
/// Accumulates, so it serves both `NO_AGG_CONST` and `COL_AGG_CONST`.
pub struct ConstSpread;

impl RowKernel for ConstSpread {
    fn exec_dense(
        &self,
        _env: &mut RowEnv<'_>,
        a: &[f64],
        c: &mut [f64],
        ci: usize,
        _row: usize,
    ) -> Result<(), KernelError> {
        let s = vect_sum(a);
        for k in 0..CONST_DIM2 {
            c[ci + k] += s * (k + 1) as f64;
        }
        Ok(())
    }

    fn exec_sparse(
        &self,
        env: &mut RowEnv<'_>,
        avals: &[f64],
        _aix: &[usize],
        c: &mut [f64],
        ci: usize,
        row: usize,
    ) -> Result<(), KernelError> {
        self.exec_dense(env, avals, c, ci, row)
    }
}

/// `sum(row)` accumulated at `ci` (`ROW_AGG`, `FULL_AGG`).
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

/// `colSums(X * s)` (`COL_AGG`, `COL_AGG_T`).
pub struct ColSum;

impl RowKernel for ColSum {
    fn exec_dense(
        &self,
        env: &mut RowEnv<'_>,
        a: &[f64],
        c: &mut [f64],
        ci: usize,
        _row: usize,
    ) -> Result<(), KernelError> {
        vect_mult_add(a, env.scalars[0], c, ci);
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
        vect_mult_add_sparse(avals, aix, env.scalars[0], c, ci);
        Ok(())
    }
}

/// `t(V) %*% X` with `V` an `m x n2` side input: output `n2 x n`. The sparse
/// path densifies the row into a scratch vector.
pub struct OuterB1;

impl RowKernel for OuterB1 {
    fn exec_dense(
        &self,
        env: &mut RowEnv<'_>,
        a: &[f64],
        c: &mut [f64],
        ci: usize,
        row: usize,
    ) -> Result<(), KernelError> {
        let v = side_row(env, row)?;
        vect_outer_mult_add(v, a, c, ci);
        Ok(())
    }

    fn exec_sparse(
        &self,
        env: &mut RowEnv<'_>,
        avals: &[f64],
        aix: &[usize],
        c: &mut [f64],
        ci: usize,
        row: usize,
    ) -> Result<(), KernelError> {
        let v = side_row(env, row)?;
        let buf = env.scratch.vector(env.n, true)?;
        for (x, &j) in avals.iter().zip(aix) {
            buf[j] = *x;
        }
        vect_outer_mult_add(v, buf, c, ci);
        Ok(())
    }
}

/// `t(X) %*% V` with `V` an `m x n2` side input: output `n x n2`.
pub struct OuterB1T;

impl RowKernel for OuterB1T {
    fn exec_dense(
        &self,
        env: &mut RowEnv<'_>,
        a: &[f64],
        c: &mut [f64],
        ci: usize,
        row: usize,
    ) -> Result<(), KernelError> {
        let v = side_row(env, row)?;
        vect_outer_mult_add(a, v, c, ci);
        Ok(())
    }

    fn exec_sparse(
        &self,
        env: &mut RowEnv<'_>,
        avals: &[f64],
        aix: &[usize],
        c: &mut [f64],
        ci: usize,
        row: usize,
    ) -> Result<(), KernelError> {
        let v = side_row(env, row)?;
        vect_outer_mult_add_sparse(avals, aix, env.n, v, c, ci);
        Ok(())
    }
}

/// `colSums(X %*% B)` with `B` an `n x n2` side input: output `1 x n2`.
pub struct ColSumTimesB1;

impl RowKernel for ColSumTimesB1 {
    fn exec_dense(
        &self,
        env: &mut RowEnv<'_>,
        a: &[f64],
        c: &mut [f64],
        ci: usize,
        _row: usize,
    ) -> Result<(), KernelError> {
        let bt = env.side(0)?;
        // B1 is consumed transposed: row k of bt is column k of B
        for k in 0..bt.rows() {
            let col = bt.dense_row(k).unwrap_or(&[]);
            c[ci + k] += dot_product(a, col);
        }
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
        let bt = env.side(0)?;
        for k in 0..bt.rows() {
            let col = bt.dense_row(k).unwrap_or(&[]);
            c[ci + k] += dot_product_sparse(avals, aix, col);
        }
        Ok(())
    }
}

/// Kernel for `rt`.
pub fn kernel(rt: RowType) -> Arc<dyn RowKernel> {
    match rt {
        RowType::NoAgg => Arc::new(Scale),
        RowType::NoAggB1 => Arc::new(TimesB1),
        RowType::NoAggConst | RowType::ColAggConst => Arc::new(ConstSpread),
        RowType::FullAgg | RowType::RowAgg => Arc::new(Sum),
        RowType::ColAgg | RowType::ColAggT => Arc::new(ColSum),
        RowType::ColAggB1 => Arc::new(OuterB1),
        RowType::ColAggB1T => Arc::new(OuterB1T),
        RowType::ColAggB1R => Arc::new(ColSumTimesB1),
    }
}

/// Operator for `rt` with the settings its kernel expects.
pub fn operator(rt: RowType, cfg: ExecConfig) -> FusedRowwise {
    let op = FusedRowwise::new(rt, kernel(rt)).with_config(cfg);
    match rt {
        RowType::NoAggConst | RowType::ColAggConst => op.with_const_dim2(CONST_DIM2),
        RowType::ColAggB1 => op.with_vector_scratch(1),
        RowType::ColAggB1R => op.with_transposed_b1(true),
        _ => op,
    }
}

/// Side inputs `rt`'s kernel reads, for an `m x n` primary input.
pub fn side_inputs(rt: RowType, m: usize, n: usize, n2: usize) -> Vec<MatrixBlock> {
    match rt {
        RowType::NoAggB1 | RowType::ColAggB1R => vec![gen_dense(n, n2, 1.0, 7).into()],
        RowType::ColAggB1 | RowType::ColAggB1T => vec![gen_dense(m, n2, 1.0, 11).into()],
        _ => Vec::new(),
    }
}

/// Naive result of `rt`'s kernel.
pub fn reference(rt: RowType, x: &DenseBlock, side: &[MatrixBlock], s: f64) -> DenseBlock {
    let (m, n) = (x.rows(), x.cols());
    let b = side.first().map(|b| b.to_dense());
    let n2 = b.as_ref().map(|b| b.cols()).unwrap_or(1);
    let row_sum = |i: usize| x.row(i).iter().sum::<f64>();
    let mut out;
    match rt {
        RowType::NoAgg => {
            out = DenseBlock::new(m, n);
            for i in 0..m {
                for j in 0..n {
                    out.set(i, j, x.get(i, j) * s);
                }
            }
        }
        RowType::NoAggB1 | RowType::ColAggB1R => {
            let b = b.unwrap();
            let mut xb = DenseBlock::new(m, n2);
            for i in 0..m {
                for k in 0..n2 {
                    xb.set(i, k, (0..n).map(|j| x.get(i, j) * b.get(j, k)).sum());
                }
            }
            if rt == RowType::NoAggB1 {
                out = xb;
            } else {
                out = DenseBlock::new(1, n2);
                for k in 0..n2 {
                    out.set(0, k, (0..m).map(|i| xb.get(i, k)).sum());
                }
            }
        }
        RowType::NoAggConst => {
            out = DenseBlock::new(m, CONST_DIM2);
            for i in 0..m {
                for k in 0..CONST_DIM2 {
                    out.set(i, k, row_sum(i) * (k + 1) as f64);
                }
            }
        }
        RowType::ColAggConst => {
            out = DenseBlock::new(1, CONST_DIM2);
            let total: f64 = (0..m).map(row_sum).sum();
            for k in 0..CONST_DIM2 {
                out.set(0, k, total * (k + 1) as f64);
            }
        }
        RowType::FullAgg => {
            out = DenseBlock::new(1, 1);
            out.set(0, 0, (0..m).map(row_sum).sum());
        }
        RowType::RowAgg => {
            out = DenseBlock::new(m, 1);
            for i in 0..m {
                out.set(i, 0, row_sum(i));
            }
        }
        RowType::ColAgg | RowType::ColAggT => {
            let sums: Vec<f64> = (0..n).map(|j| (0..m).map(|i| x.get(i, j) * s).sum()).collect();
            out = if rt == RowType::ColAgg {
                DenseBlock::from_vec(1, n, sums).unwrap()
            } else {
                DenseBlock::from_vec(n, 1, sums).unwrap()
            };
        }
        RowType::ColAggB1 | RowType::ColAggB1T => {
            let v = b.unwrap();
            let mut vtx = DenseBlock::new(n2, n);
            for k in 0..n2 {
                for j in 0..n {
                    vtx.set(k, j, (0..m).map(|i| v.get(i, k) * x.get(i, j)).sum());
                }
            }
            out = if rt == RowType::ColAggB1 { vtx } else { vtx.transpose() };
        }
    }
    out.recompute_nonzeros();
    out
}

/// Writes `row + 1` into its output cell, whether or not the row has data.
pub struct RowIndex;

impl RowKernel for RowIndex {
    fn exec_dense(
        &self,
        _env: &mut RowEnv<'_>,
        _a: &[f64],
        c: &mut [f64],
        ci: usize,
        row: usize,
    ) -> Result<(), KernelError> {
        c[ci] = row as f64 + 1.0;
        Ok(())
    }

    fn exec_sparse(
        &self,
        _env: &mut RowEnv<'_>,
        _avals: &[f64],
        _aix: &[usize],
        c: &mut [f64],
        ci: usize,
        row: usize,
    ) -> Result<(), KernelError> {
        c[ci] = row as f64 + 1.0;
        Ok(())
    }
}

/// Fails on every row at or past `from`.
pub struct FailFrom {
    pub from: usize,
}

impl RowKernel for FailFrom {
    fn exec_dense(
        &self,
        _env: &mut RowEnv<'_>,
        a: &[f64],
        c: &mut [f64],
        ci: usize,
        row: usize,
    ) -> Result<(), KernelError> {
        if row >= self.from {
            return Err(KernelError::Row { row, msg: "injected failure".into() });
        }
        c[ci] = vect_sum(a);
        Ok(())
    }

    fn exec_sparse(
        &self,
        env: &mut RowEnv<'_>,
        avals: &[f64],
        _aix: &[usize],
        c: &mut [f64],
        ci: usize,
        row: usize,
    ) -> Result<(), KernelError> {
        self.exec_dense(env, avals, c, ci, row)
    }
}
