use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use matfuse_core::config::ExecConfig;
use matfuse_core::matrix::{DenseBlock, MatrixBlock, SparseBlock};
use matfuse_exec::primitives::{vect_add, vect_sum};
use matfuse_exec::{FusedRowwise, KernelError, RowEnv, RowKernel, RowType};

/// `rowSums(X)` or `colSums(X)` depending on the row type.
struct Sums {
    col: bool,
}

impl RowKernel for Sums {
    fn exec_dense(
        &self,
        _env: &mut RowEnv<'_>,
        a: &[f64],
        c: &mut [f64],
        ci: usize,
        _row: usize,
    ) -> Result<(), KernelError> {
        if self.col {
            vect_add(a, c, ci);
        } else {
            c[ci] += vect_sum(a);
        }
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
        if self.col {
            for (v, &j) in avals.iter().zip(aix) {
                c[ci + j] += v;
            }
        } else {
            c[ci] += vect_sum(avals);
        }
        Ok(())
    }
}

fn make_block(rows: usize, cols: usize, keep_every: usize) -> DenseBlock {
    let mut d = DenseBlock::new(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            if (i * cols + j) % keep_every == 0 {
                d.set(i, j, ((i + j) % 7) as f64 + 0.5);
            }
        }
    }
    d.recompute_nonzeros();
    d
}

fn bench_rowwise(c: &mut Criterion) {
    let dense = make_block(4096, 256, 1);
    let sparse = SparseBlock::from_dense(&make_block(4096, 256, 10));
    let inputs = [
        ("dense", MatrixBlock::from(dense)),
        ("sparse", MatrixBlock::from(sparse)),
    ];
    let mut cfg = ExecConfig::default();
    cfg.par_numcell_threshold = 1;
    let k = cfg.max_parallel_tasks.max(2);

    let mut group = c.benchmark_group("rowwise");
    for (row_type, col) in [(RowType::RowAgg, false), (RowType::ColAgg, true)] {
        let op = FusedRowwise::new(row_type, Arc::new(Sums { col })).with_config(cfg.clone());
        for (label, a) in &inputs {
            let id = format!("{row_type}/{label}");
            group.bench_with_input(BenchmarkId::new("serial", &id), a, |b, a| {
                b.iter(|| op.execute(&[a], &[]).unwrap())
            });
            group.bench_with_input(BenchmarkId::new("parallel", &id), a, |b, a| {
                b.iter(|| op.execute_parallel(&[a], &[], k).unwrap())
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_rowwise);
criterion_main!(benches);
