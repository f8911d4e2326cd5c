//! Runtime: interpret a lowered `PhysicalProgram` locally and emit a
//! `RunManifest`.
//!
//! Behavior:
//! - `Data` lops read blocks bound by name with [`LopExecutor::bind`].
//! - Every lop is evaluated once per run; shared inputs are reused.
//! - Distributed aggregation chains are simulated with keyed cells: the
//!   diagonal partial aggregate emits `(i, 0, a_ii)`, `Group` sorts the cells
//!   by key and `Aggregate` folds equal keys.
//! - Results are dense.

use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use matfuse_core::hash::{hash_serde, Hash256};
use matfuse_core::id::LopId;
use matfuse_core::manifest::RunManifest;
use matfuse_core::matrix::{DenseBlock, MatrixBlock};

use matfuse_planner::lops::{AggOp, GroupOp, Lop, LopKind, PhysicalProgram, TransformOp};

use crate::error::ExecError;

/// One keyed partial result.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    row: usize,
    col: usize,
    value: f64,
}

#[derive(Debug, Clone)]
enum Value {
    Matrix(DenseBlock),
    Cells(Vec<Cell>),
}

impl Value {
    fn label(&self) -> &'static str {
        match self {
            Value::Matrix(_) => "matrix",
            Value::Cells(_) => "keyed cells",
        }
    }
}

/// Results of one run, in root order.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub results: Vec<DenseBlock>,
    pub manifest: RunManifest,
}

/// Local interpreter for physical plans.
#[derive(Debug, Default)]
pub struct LopExecutor {
    inputs: HashMap<String, MatrixBlock>,
    memo: HashMap<LopId, Value>,
}

impl LopExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the block read by `Data` lops named `name`.
    pub fn bind(&mut self, name: impl Into<String>, block: impl Into<MatrixBlock>) -> &mut Self {
        self.inputs.insert(name.into(), block.into());
        self
    }

    /// Evaluate every root of `program`.
    pub fn run(&mut self, program: &PhysicalProgram) -> Result<RunOutput, ExecError> {
        let plan_hash = program.fingerprint()?;
        let sorted: BTreeMap<&String, &MatrixBlock> = self.inputs.iter().collect();
        let inputs_digest = hash_serde(&sorted)?;
        let manifest = RunManifest::new(plan_hash, now_millis()).with_inputs_digest(inputs_digest);

        self.memo.clear();
        let mut results = Vec::with_capacity(program.roots.len());
        for root in &program.roots {
            results.push(self.eval(root)?);
        }
        let outputs_digest = digest_outputs(&results)?;
        let manifest = manifest.finish(now_millis(), self.memo.len(), Some(outputs_digest));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            plan = %manifest.plan_hash.short(),
            lops = manifest.lops_executed,
            "plan executed"
        );

        Ok(RunOutput { results, manifest })
    }

    /// Evaluate a single lop DAG to a dense block.
    pub fn eval(&mut self, lop: &Lop) -> Result<DenseBlock, ExecError> {
        match self.eval_value(lop)? {
            Value::Matrix(d) => Ok(d),
            Value::Cells(_) => Err(ExecError::Plan(format!(
                "{} produces keyed cells, not a matrix",
                lop.kind.label()
            ))),
        }
    }

    fn eval_value(&mut self, lop: &Lop) -> Result<Value, ExecError> {
        if let Some(v) = self.memo.get(&lop.id) {
            return Ok(v.clone());
        }
        let mut args = Vec::with_capacity(lop.inputs.len());
        for input in &lop.inputs {
            args.push(self.eval_value(input)?);
        }
        let out = self.apply(lop, args)?;

        #[cfg(feature = "tracing")]
        tracing::trace!(lop = %lop.id, kind = %lop.kind.label(), out = out.label(), "executed lop");

        self.memo.insert(lop.id, out.clone());
        Ok(out)
    }

    fn apply(&self, lop: &Lop, args: Vec<Value>) -> Result<Value, ExecError> {
        match &lop.kind {
            LopKind::Data { name } => {
                let block = self
                    .inputs
                    .get(name)
                    .ok_or_else(|| ExecError::Plan(format!("no input bound for '{name}'")))?;
                check_declared_dims(lop, block.rows(), block.cols())?;
                Ok(Value::Matrix(block.to_dense()))
            }
            LopKind::Transform { op } => {
                let a = single_matrix(lop, args)?;
                Ok(Value::Matrix(transform(*op, &a)?))
            }
            LopKind::PartialAggregate { op: AggOp::DiagM2V, .. } => {
                let a = single_matrix(lop, args)?;
                Ok(Value::Cells(diag_cells(&a)?))
            }
            LopKind::PartialAggregate { op, direction } => Err(ExecError::Plan(format!(
                "partial aggregate {op:?} along {direction:?} is not supported"
            ))),
            LopKind::Group { op: GroupOp::Sort } => {
                let mut cells = single_cells(lop, args)?;
                cells.sort_by_key(|c| (c.row, c.col));
                Ok(Value::Cells(cells))
            }
            LopKind::Aggregate { op: AggOp::Sum } => {
                let cells = single_cells(lop, args)?;
                let (rows, cols) = match (lop.output.rows, lop.output.cols) {
                    (Some(r), Some(c)) => (r as usize, c as usize),
                    _ => {
                        return Err(ExecError::Plan(format!(
                            "{} needs known output dims",
                            lop.kind.label()
                        )))
                    }
                };
                Ok(Value::Matrix(aggregate_sum(&cells, rows, cols)?))
            }
            LopKind::Aggregate { op } => Err(ExecError::Plan(format!(
                "final aggregate {op:?} is not supported"
            ))),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn digest_outputs(results: &[DenseBlock]) -> Result<Hash256, ExecError> {
    Ok(hash_serde(&results)?)
}

fn check_declared_dims(lop: &Lop, rows: usize, cols: usize) -> Result<(), ExecError> {
    let declared = (lop.output.rows, lop.output.cols);
    let fits = declared.0.map_or(true, |r| r as usize == rows)
        && declared.1.map_or(true, |c| c as usize == cols);
    if fits {
        Ok(())
    } else {
        Err(ExecError::Plan(format!(
            "{}: bound block is {rows}x{cols}, plan declares {}",
            lop.kind.label(),
            lop.output
        )))
    }
}

fn single(lop: &Lop, args: Vec<Value>) -> Result<Value, ExecError> {
    let n = args.len();
    let mut it = args.into_iter();
    match (it.next(), n) {
        (Some(v), 1) => Ok(v),
        _ => Err(ExecError::Plan(format!(
            "{} expects exactly 1 input, got {n}",
            lop.kind.label()
        ))),
    }
}

fn single_matrix(lop: &Lop, args: Vec<Value>) -> Result<DenseBlock, ExecError> {
    match single(lop, args)? {
        Value::Matrix(d) => Ok(d),
        other => Err(ExecError::Plan(format!(
            "{} expects a matrix input, got {}",
            lop.kind.label(),
            other.label()
        ))),
    }
}

fn single_cells(lop: &Lop, args: Vec<Value>) -> Result<Vec<Cell>, ExecError> {
    match single(lop, args)? {
        Value::Cells(c) => Ok(c),
        other => Err(ExecError::Plan(format!(
            "{} expects keyed cells, got {}",
            lop.kind.label(),
            other.label()
        ))),
    }
}

fn transform(op: TransformOp, a: &DenseBlock) -> Result<DenseBlock, ExecError> {
    let (rows, cols) = (a.rows(), a.cols());
    let out = match op {
        TransformOp::Transpose => a.transpose(),
        TransformOp::DiagV2M => {
            if rows != 1 && cols != 1 {
                return Err(ExecError::Plan(format!(
                    "diag of a {rows}x{cols} matrix into a matrix needs a vector"
                )));
            }
            let k = rows.max(cols);
            let mut out = DenseBlock::new(k, k);
            for (i, v) in a.values().iter().enumerate() {
                out.set(i, i, *v);
            }
            out.recompute_nonzeros();
            out
        }
        TransformOp::DiagM2V => {
            require_square(rows, cols)?;
            let diag = (0..rows).map(|i| a.get(i, i)).collect();
            let mut out = DenseBlock::from_vec(rows, 1, diag)?;
            out.recompute_nonzeros();
            out
        }
    };
    Ok(out)
}

fn require_square(rows: usize, cols: usize) -> Result<(), ExecError> {
    if rows == cols {
        Ok(())
    } else {
        Err(ExecError::Plan(format!(
            "diagonal extraction needs a square matrix, got {rows}x{cols}"
        )))
    }
}

/// Non-zero diagonal cells re-indexed into column 0.
fn diag_cells(a: &DenseBlock) -> Result<Vec<Cell>, ExecError> {
    require_square(a.rows(), a.cols())?;
    Ok((0..a.rows())
        .map(|i| Cell { row: i, col: 0, value: a.get(i, i) })
        .filter(|c| c.value != 0.0)
        .collect())
}

/// Fold grouped cells into a `rows x cols` block.
fn aggregate_sum(cells: &[Cell], rows: usize, cols: usize) -> Result<DenseBlock, ExecError> {
    let mut out = DenseBlock::new(rows, cols);
    for group in cells.chunk_by(|a, b| (a.row, a.col) == (b.row, b.col)) {
        let Cell { row, col, .. } = group[0];
        if row >= rows || col >= cols {
            return Err(ExecError::Plan(format!(
                "cell ({row}, {col}) outside the {rows}x{cols} aggregate"
            )));
        }
        out.set(row, col, group.iter().map(|c| c.value).sum());
    }
    out.recompute_nonzeros();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use matfuse_core::id::SourcePosition;
    use matfuse_core::types::ExecType;
    use matfuse_planner::lops::{CorrectionLocation, Direction, OutputParameters};
    use std::sync::Arc;

    fn params(rows: u64, cols: u64, block: u32) -> OutputParameters {
        OutputParameters {
            rows: Some(rows),
            cols: Some(cols),
            rows_in_block: block,
            cols_in_block: block,
            nnz: None,
        }
    }

    fn data(name: &str, rows: u64, cols: u64, block: u32) -> Arc<Lop> {
        Arc::new(Lop::data(name, params(rows, cols, block), SourcePosition::default()))
    }

    #[test]
    fn transforms() {
        let a = DenseBlock::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(transform(TransformOp::Transpose, &a).unwrap().values(), &[1.0, 3.0, 2.0, 4.0]);
        assert_eq!(transform(TransformOp::DiagM2V, &a).unwrap().values(), &[1.0, 4.0]);

        let v = DenseBlock::from_vec(2, 1, vec![5.0, 6.0]).unwrap();
        let d = transform(TransformOp::DiagV2M, &v).unwrap();
        assert_eq!(d.values(), &[5.0, 0.0, 0.0, 6.0]);
        assert_eq!(d.non_zeros(), 2);

        let rect = DenseBlock::new(2, 3);
        assert!(matches!(transform(TransformOp::DiagM2V, &rect), Err(ExecError::Plan(_))));
        assert!(transform(TransformOp::DiagV2M, &rect).is_err());
    }

    #[test]
    fn diag_chain_with_zero_on_diagonal() {
        let a = DenseBlock::from_rows(&[vec![1.0, 2.0], vec![3.0, 0.0]]).unwrap();
        let pos = SourcePosition::default();
        let out = params(2, 1, 1000);
        let partial = Arc::new(
            Lop::partial_aggregate(
                data("A", 2, 2, 1000),
                AggOp::DiagM2V,
                Direction::Col,
                ExecType::Distributed,
                out,
                pos,
            )
            .unwrap(),
        );
        let group = Arc::new(Lop::group(partial, GroupOp::Sort, ExecType::Distributed, out, pos));
        let agg = Lop::aggregate(group, AggOp::Sum, ExecType::Distributed, out, pos)
            .unwrap()
            .with_correction(CorrectionLocation::None);

        let mut exec = LopExecutor::new();
        exec.bind("A", a);
        let d = exec.eval(&agg).unwrap();
        assert_eq!(d.values(), &[1.0, 0.0]);
        assert_eq!(d.non_zeros(), 1);
    }

    #[test]
    fn repeated_keys_are_summed() {
        let cells = vec![
            Cell { row: 0, col: 0, value: 1.5 },
            Cell { row: 0, col: 0, value: 2.0 },
            Cell { row: 2, col: 0, value: -1.0 },
        ];
        let out = aggregate_sum(&cells, 3, 1).unwrap();
        assert_eq!(out.values(), &[3.5, 0.0, -1.0]);
        assert_eq!(out.non_zeros(), 2);
        assert!(matches!(aggregate_sum(&cells, 2, 1), Err(ExecError::Plan(_))));
    }

    #[test]
    fn unbound_and_mismatched_inputs_fail() {
        let mut exec = LopExecutor::new();
        assert!(matches!(exec.eval(&data("X", 2, 2, 1000)), Err(ExecError::Plan(_))));
        exec.bind("X", DenseBlock::new(3, 2));
        assert!(matches!(exec.eval(&data("X", 2, 2, 1000)), Err(ExecError::Plan(_))));
    }

    #[test]
    fn cells_are_not_a_result() {
        let partial = Lop::partial_aggregate(
            data("A", 2, 2, 1000),
            AggOp::DiagM2V,
            Direction::Col,
            ExecType::Distributed,
            params(2, 1, 1000),
            SourcePosition::default(),
        )
        .unwrap();
        let mut exec = LopExecutor::new();
        exec.bind("A", DenseBlock::new(2, 2));
        assert!(matches!(exec.eval(&partial), Err(ExecError::Plan(_))));
    }

    #[test]
    fn partial_sums_are_rejected() {
        let partial = Lop::partial_aggregate(
            data("A", 2, 2, 1000),
            AggOp::Sum,
            Direction::Row,
            ExecType::Distributed,
            params(2, 1, 1000),
            SourcePosition::default(),
        )
        .unwrap();
        let mut exec = LopExecutor::new();
        exec.bind("A", DenseBlock::new(2, 2));
        match exec.eval(&partial) {
            Err(ExecError::Plan(msg)) => assert!(msg.contains("not supported")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn shared_lops_are_evaluated_once() {
        let pos = SourcePosition::default();
        let a = data("A", 2, 3, 1000);
        let t = Arc::new(Lop::transform(a, TransformOp::Transpose, ExecType::Local, params(3, 2, 1000), pos));
        let tt = Arc::new(Lop::transform(
            Arc::clone(&t),
            TransformOp::Transpose,
            ExecType::Local,
            params(2, 3, 1000),
            pos,
        ));
        let program = PhysicalProgram::new(vec![t, tt]);

        let mut exec = LopExecutor::new();
        exec.bind("A", DenseBlock::from_rows(&[vec![1.0, 0.0, 2.0], vec![0.0, 3.0, 0.0]]).unwrap());
        let first = exec.run(&program).unwrap();
        assert_eq!(first.manifest.lops_executed, 3);
        assert_eq!((first.results[0].rows(), first.results[0].cols()), (3, 2));
        assert_eq!(first.results[1].values(), &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);

        let second = exec.run(&program).unwrap();
        assert!(first.manifest.same_results(&second.manifest));
    }
}
