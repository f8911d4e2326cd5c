//! Fused row-wise operator.
//!
//! A generated kernel supplies per-row logic ([`RowKernel`]); this module
//! drives it over every row of the primary input, whatever its physical
//! representation, and shapes the output according to the [`RowType`].
//!
//! Output offsets handed to the kernel:
//! - row-wise types (`NO_AGG*`, `ROW_AGG`): start of the row's output slice;
//! - aggregating types: always 0, every row accumulates into the same cells.
//!
//! The output is always dense.

use std::ops::Range;
use std::sync::Arc;

use matfuse_core::config::ExecConfig;
use matfuse_core::matrix::{count_nonzeros, DenseBlock, MatrixBlock, SparseBlock};
use matfuse_mem::{MemoryBudgetImpl, ScratchArena};

use crate::codegen::primitives::{is_flip_outer, vect_add};
use crate::codegen::row_type::RowType;
use crate::error::{ExecError, KernelError};
use crate::metrics;
use crate::partition::plan_row_ranges;
use crate::pool::TaskGroup;
use crate::side_input::{
    has_matrix_side_input, min_cols_matrix_side_inputs, prepare_side_inputs, SideInput,
};

/// Per-call state a kernel sees for every row.
pub struct RowEnv<'a> {
    pub side: &'a [SideInput<'a>],
    pub scalars: &'a [f64],
    pub scratch: &'a mut ScratchArena,
    /// Logical row length of the primary input.
    pub n: usize,
    /// Second output dimension, if the operator has one.
    pub n2: Option<usize>,
}

impl<'a> RowEnv<'a> {
    pub fn side(&self, index: usize) -> Result<&'a SideInput<'a>, KernelError> {
        self.side.get(index).ok_or(KernelError::MissingSideInput {
            index,
            count: self.side.len(),
        })
    }
}

/// Generated per-row logic. Both entry points must compute the same result;
/// the sparse form only skips zeros. `ci` is the output offset for `row`.
pub trait RowKernel: Send + Sync {
    fn exec_dense(
        &self,
        env: &mut RowEnv<'_>,
        a: &[f64],
        c: &mut [f64],
        ci: usize,
        row: usize,
    ) -> Result<(), KernelError>;

    /// `avals`/`aix` are empty for an empty row; the kernel still runs.
    fn exec_sparse(
        &self,
        env: &mut RowEnv<'_>,
        avals: &[f64],
        aix: &[usize],
        c: &mut [f64],
        ci: usize,
        row: usize,
    ) -> Result<(), KernelError>;
}

#[derive(Default)]
pub struct ExecOptions<'s> {
    /// Caller-owned scratch arena to reuse instead of acquiring one.
    pub scratch: Option<&'s mut ScratchArena>,
    /// Accumulate into the given output as-is. Skips reallocation and the
    /// final non-zero recount, leaving a conservative count behind.
    pub agg_incremental: bool,
}

#[derive(Clone, Copy)]
struct OutIndex {
    row_wise: bool,
    base: usize,
    width: usize,
}

impl OutIndex {
    #[inline]
    fn ci(&self, row: usize) -> usize {
        if self.row_wise {
            (row - self.base) * self.width
        } else {
            0
        }
    }
}

struct Prepared<'a> {
    a: &'a MatrixBlock,
    side: Vec<SideInput<'a>>,
    m: usize,
    n: usize,
    n2: Option<usize>,
    out_rows: usize,
    out_cols: usize,
    flip: bool,
}

#[derive(Clone)]
pub struct FusedRowwise {
    kernel: Arc<dyn RowKernel>,
    row_type: RowType,
    const_dim2: Option<usize>,
    t_b1: bool,
    req_vect_mem: usize,
    cfg: ExecConfig,
}

impl FusedRowwise {
    pub fn new(row_type: RowType, kernel: Arc<dyn RowKernel>) -> Self {
        Self {
            kernel,
            row_type,
            const_dim2: None,
            t_b1: false,
            req_vect_mem: 0,
            cfg: ExecConfig::default(),
        }
    }

    /// Fixed second output dimension.
    pub fn with_const_dim2(mut self, dim2: usize) -> Self {
        self.const_dim2 = Some(dim2);
        self
    }

    /// Consume the first side input transposed.
    pub fn with_transposed_b1(mut self, t_b1: bool) -> Self {
        self.t_b1 = t_b1;
        self
    }

    /// Number of scratch vectors the kernel needs per length.
    pub fn with_vector_scratch(mut self, count: usize) -> Self {
        self.req_vect_mem = count;
        self
    }

    pub fn with_config(mut self, cfg: ExecConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn row_type(&self) -> RowType {
        self.row_type
    }

    pub fn const_dim2(&self) -> Option<usize> {
        self.const_dim2
    }

    pub fn num_intermediates(&self) -> usize {
        self.req_vect_mem
    }

    /// Second output dimension for these inputs.
    pub fn resolve_n2(&self, inputs: &[&MatrixBlock]) -> Option<usize> {
        if self.row_type.is_const_dim2(self.const_dim2) {
            self.const_dim2
        } else if self.row_type.is_b1() || has_matrix_side_input(inputs) {
            Some(min_cols_matrix_side_inputs(inputs))
        } else {
            None
        }
    }

    /// Output dims for these inputs.
    pub fn output_shape(&self, inputs: &[&MatrixBlock]) -> Result<(usize, usize), ExecError> {
        let a = inputs
            .first()
            .ok_or_else(|| ExecError::InvalidArgument("no inputs".into()))?;
        let n2 = self.resolve_n2(inputs);
        self.row_type
            .output_shape(a.rows(), a.cols(), n2, self.const_dim2)
            .ok_or_else(|| {
                ExecError::InvalidArgument(format!(
                    "{} needs a second output dimension (n2={n2:?}, const={:?})",
                    self.row_type, self.const_dim2
                ))
            })
    }

    fn prepare<'a>(&self, inputs: &[&'a MatrixBlock]) -> Result<Prepared<'a>, ExecError> {
        let a = *inputs
            .first()
            .ok_or_else(|| ExecError::InvalidArgument("no inputs".into()))?;
        let (out_rows, out_cols) = self.output_shape(inputs)?;
        Ok(Prepared {
            a,
            side: prepare_side_inputs(inputs, self.t_b1),
            m: a.rows(),
            n: a.cols(),
            n2: self.resolve_n2(inputs),
            out_rows,
            out_cols,
            flip: self.row_type.is_b1_column_agg() && is_flip_outer(out_rows, out_cols),
        })
    }

    /// Scratch for one task, accounted against its own `scratch_cap_bytes`
    /// budget.
    fn acquire_scratch(
        &self,
        n: usize,
        n2: Option<usize>,
    ) -> Result<ScratchArena, matfuse_mem::Error> {
        if self.req_vect_mem == 0 {
            return Ok(ScratchArena::empty());
        }
        let budget = MemoryBudgetImpl::new(self.cfg.scratch_cap_bytes);
        ScratchArena::acquire(&budget, self.req_vect_mem, n, n2)
    }

    fn out_index(&self, base: usize, width: usize) -> OutIndex {
        OutIndex {
            row_wise: self.row_type.writes_rows(),
            base,
            width,
        }
    }

    /// Run the kernel over `rows` of the primary input.
    fn run_rows(
        &self,
        p: &Prepared<'_>,
        env: &mut RowEnv<'_>,
        c: &mut [f64],
        out: OutIndex,
        rows: Range<usize>,
    ) -> Result<(), KernelError> {
        let kernel = &*self.kernel;
        match p.a {
            MatrixBlock::Dense(d) => {
                for i in rows {
                    kernel.exec_dense(env, d.row(i), c, out.ci(i), i)?;
                }
            }
            MatrixBlock::Sparse(s) => self.run_sparse_rows(Some(s), env, c, out, rows)?,
            MatrixBlock::Compressed(cb) if cb.is_empty_block() => {
                self.run_sparse_rows(None, env, c, out, rows)?
            }
            MatrixBlock::Compressed(cb) => {
                let mut cursor = cb.dense_row_cursor(rows.start, rows.end);
                let mut i = rows.start;
                while let Some(row) = cursor.next_row() {
                    kernel.exec_dense(env, row, c, out.ci(i), i)?;
                    i += 1;
                }
            }
        }
        Ok(())
    }

    /// Sparse rows; empty rows (or a missing block) still reach the kernel.
    fn run_sparse_rows(
        &self,
        a: Option<&SparseBlock>,
        env: &mut RowEnv<'_>,
        c: &mut [f64],
        out: OutIndex,
        rows: Range<usize>,
    ) -> Result<(), KernelError> {
        let kernel = &*self.kernel;
        for i in rows {
            match a {
                Some(s) if !s.is_empty_row(i) => {
                    let (vals, ix) = s.row(i);
                    kernel.exec_sparse(env, vals, ix, c, out.ci(i), i)?;
                }
                _ => kernel.exec_sparse(env, &[], &[], c, out.ci(i), i)?,
            }
        }
        Ok(())
    }

    /// Single-threaded execution into a freshly allocated output.
    pub fn execute(&self, inputs: &[&MatrixBlock], scalars: &[f64]) -> Result<DenseBlock, ExecError> {
        let mut out = DenseBlock::new(0, 0);
        self.execute_into(inputs, scalars, &mut out, ExecOptions::default())?;
        Ok(out)
    }

    /// Single-threaded execution into `out`.
    pub fn execute_into(
        &self,
        inputs: &[&MatrixBlock],
        scalars: &[f64],
        out: &mut DenseBlock,
        opts: ExecOptions<'_>,
    ) -> Result<(), ExecError> {
        let p = self.prepare(inputs)?;
        self.run_serial(&p, scalars, out, opts)
    }

    fn run_serial(
        &self,
        p: &Prepared<'_>,
        scalars: &[f64],
        out: &mut DenseBlock,
        opts: ExecOptions<'_>,
    ) -> Result<(), ExecError> {
        let (rows, cols) = (p.out_rows, p.out_cols);
        let fresh = !opts.agg_incremental || out.rows() != rows || out.cols() != cols;
        if fresh {
            out.reset(rows, cols);
        } else if p.flip {
            // bring the accumulated values into the flipped layout
            *out = out.transpose();
            out.swap_dims_conservative();
        }

        {
            let mut owned;
            let scratch = match opts.scratch {
                Some(s) => s,
                None => {
                    owned = self.acquire_scratch(p.n, p.n2)?;
                    &mut owned
                }
            };
            let mut env = RowEnv {
                side: &p.side,
                scalars,
                scratch,
                n: p.n,
                n2: p.n2,
            };
            let idx = self.out_index(0, cols);
            self.run_rows(p, &mut env, out.values_mut(), idx, 0..p.m)?;
        }

        if p.flip {
            out.swap_dims_conservative();
            *out = out.transpose();
        }
        if opts.agg_incremental {
            out.set_non_zeros((rows * cols) as u64);
        } else {
            out.recompute_nonzeros();
        }
        Ok(())
    }

    /// Per-task accumulators of a column aggregation fit the memory cap.
    fn check_par_column_agg(&self, p: &Prepared<'_>, k: usize) -> bool {
        let acc_cells = (p.out_rows * p.out_cols) as u64;
        8 * acc_cells * k as u64 <= self.cfg.par_col_agg_mem_threshold
    }

    /// Multi-threaded execution with `k` workers, capped at
    /// `max_parallel_tasks`. Falls back to [`FusedRowwise::execute`] when
    /// parallelism is not worthwhile.
    pub fn execute_parallel(
        &self,
        inputs: &[&MatrixBlock],
        scalars: &[f64],
        k: usize,
    ) -> Result<DenseBlock, ExecError> {
        let p = self.prepare(inputs)?;
        let k = k.min(self.cfg.max_parallel_tasks.max(1));
        let total_cells: u64 = inputs.iter().map(|b| b.cells()).sum();
        if k <= 1
            || (self.row_type.is_column_agg() && !self.check_par_column_agg(&p, k))
            || total_cells < self.cfg.par_numcell_threshold
        {
            #[cfg(feature = "tracing")]
            tracing::trace!(k, total_cells, row_type = %self.row_type, "rowwise serial fallback");
            let mut out = DenseBlock::new(0, 0);
            self.run_serial(&p, scalars, &mut out, ExecOptions::default())?;
            return Ok(out);
        }

        let (rows, cols) = (p.out_rows, p.out_cols);
        let ranges = plan_row_ranges(p.a, k, &self.cfg);
        let group = TaskGroup::new(k)?;
        let mut out = DenseBlock::new(rows, cols);

        metrics::emit_span(
            "rowwise.parallel",
            &[
                ("row_type", self.row_type.to_string()),
                ("tasks", ranges.len().to_string()),
                ("threads", group.threads().to_string()),
            ],
        );

        if self.row_type.aggregates_all_rows() {
            let len = rows * cols;
            let partials = group.run(ranges, |_, range| {
                let mut acc = vec![0.0; len];
                let mut scratch = self.acquire_scratch(p.n, p.n2)?;
                let mut env = RowEnv {
                    side: &p.side,
                    scalars,
                    scratch: &mut scratch,
                    n: p.n,
                    n2: p.n2,
                };
                self.run_rows(&p, &mut env, &mut acc, self.out_index(0, cols), range)?;
                Ok(acc)
            })?;
            let c = out.values_mut();
            for part in &partials {
                vect_add(part, c, 0);
            }
            if p.flip {
                out.swap_dims_conservative();
                out = out.transpose();
            }
            out.recompute_nonzeros();
        } else {
            let mut chunks = Vec::with_capacity(ranges.len());
            let mut rest = out.values_mut();
            for range in ranges {
                let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len() * cols);
                chunks.push((range, head));
                rest = tail;
            }
            let counts = group.run(chunks, |_, (range, c)| {
                let mut scratch = self.acquire_scratch(p.n, p.n2)?;
                let mut env = RowEnv {
                    side: &p.side,
                    scalars,
                    scratch: &mut scratch,
                    n: p.n,
                    n2: p.n2,
                };
                let idx = self.out_index(range.start, cols);
                self.run_rows(&p, &mut env, c, idx, range)?;
                Ok(count_nonzeros(c))
            })?;
            out.set_non_zeros(counts.iter().sum());
        }

        Ok(out)
    }

    /// Scalar result of a `FULL_AGG` operator.
    pub fn execute_scalar(
        &self,
        inputs: &[&MatrixBlock],
        scalars: &[f64],
        k: usize,
    ) -> Result<f64, ExecError> {
        if self.row_type != RowType::FullAgg {
            return Err(ExecError::InvalidArgument(format!(
                "scalar execution needs FULL_AGG, operator is {}",
                self.row_type
            )));
        }
        let out = if k > 1 {
            self.execute_parallel(inputs, scalars, k)?
        } else {
            self.execute(inputs, scalars)?
        };
        Ok(out.get(0, 0))
    }
}
