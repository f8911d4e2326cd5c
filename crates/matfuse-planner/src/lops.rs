//! Physical operator nodes ("lops").
//!
//! A lop is a placement-decided execution step. Lops form a DAG through
//! `Arc` inputs; once lowering hands them out they belong to whoever runs
//! the plan.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use matfuse_core::dims::DataCharacteristics;
use matfuse_core::hash::{hash_serde, Hash256};
use matfuse_core::id::{LopId, SourcePosition};
use matfuse_core::types::ExecType;

use crate::error::LopError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformOp {
    Transpose,
    #[serde(rename = "diag_v2m")]
    DiagV2M,
    #[serde(rename = "diag_m2v")]
    DiagM2V,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggOp {
    Sum,
    /// Re-index diagonal cells of a matrix into a column.
    #[serde(rename = "diag_m2v")]
    DiagM2V,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Row,
    Col,
    RowCol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOp {
    /// Sort cells by output index so equal keys are adjacent.
    Sort,
}

/// Where the compensation term of a Kahan-style sum travels with the
/// partial results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionLocation {
    None,
    LastRow,
    LastColumn,
}

impl CorrectionLocation {
    /// Correction layout produced by a partial aggregate.
    pub fn for_partial(op: AggOp, direction: Direction) -> Self {
        match (op, direction) {
            (AggOp::Sum, Direction::Col) => CorrectionLocation::LastRow,
            (AggOp::Sum, Direction::Row | Direction::RowCol) => CorrectionLocation::LastColumn,
            (AggOp::DiagM2V, _) => CorrectionLocation::None,
        }
    }
}

/// Output shape parameters carried by every lop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputParameters {
    pub rows: Option<u64>,
    pub cols: Option<u64>,
    pub rows_in_block: u32,
    pub cols_in_block: u32,
    pub nnz: Option<u64>,
}

impl From<&DataCharacteristics> for OutputParameters {
    fn from(dc: &DataCharacteristics) -> Self {
        Self {
            rows: dc.rows,
            cols: dc.cols,
            rows_in_block: dc.rows_in_block,
            cols_in_block: dc.cols_in_block,
            nnz: dc.nnz,
        }
    }
}

impl fmt::Display for OutputParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: Option<u64>| v.map(|v| v.to_string()).unwrap_or_else(|| "?".into());
        write!(
            f,
            "[{}x{}, blk={}x{}, nnz={}]",
            opt(self.rows),
            opt(self.cols),
            self.rows_in_block,
            self.cols_in_block,
            opt(self.nnz)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "lop", rename_all = "snake_case")]
pub enum LopKind {
    Data { name: String },
    Transform { op: TransformOp },
    PartialAggregate { op: AggOp, direction: Direction },
    Group { op: GroupOp },
    Aggregate { op: AggOp },
}

impl LopKind {
    pub fn label(&self) -> String {
        match self {
            LopKind::Data { name } => format!("Data({name})"),
            LopKind::Transform { op } => format!("Transform({op:?})"),
            LopKind::PartialAggregate { op, direction } => {
                format!("PartialAggregate({op:?}, {direction:?})")
            }
            LopKind::Group { op } => format!("Group({op:?})"),
            LopKind::Aggregate { op } => format!("Aggregate({op:?})"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lop {
    /// Process-unique id; excluded from fingerprints.
    #[serde(skip, default = "LopId::next")]
    pub id: LopId,
    pub kind: LopKind,
    pub exec_type: ExecType,
    pub output: OutputParameters,
    #[serde(default)]
    pub correction: Option<CorrectionLocation>,
    pub position: SourcePosition,
    pub inputs: Vec<Arc<Lop>>,
}

impl Lop {
    fn build(
        kind: LopKind,
        inputs: Vec<Arc<Lop>>,
        exec_type: ExecType,
        output: OutputParameters,
        position: SourcePosition,
    ) -> Self {
        Self {
            id: LopId::next(),
            kind,
            exec_type,
            output,
            correction: None,
            position,
            inputs,
        }
    }

    pub fn data(
        name: impl Into<String>,
        output: OutputParameters,
        position: SourcePosition,
    ) -> Self {
        Self::build(
            LopKind::Data { name: name.into() },
            Vec::new(),
            ExecType::Local,
            output,
            position,
        )
    }

    pub fn transform(
        input: Arc<Lop>,
        op: TransformOp,
        exec_type: ExecType,
        output: OutputParameters,
        position: SourcePosition,
    ) -> Self {
        Self::build(LopKind::Transform { op }, vec![input], exec_type, output, position)
    }

    /// Partial (map-side) aggregate. Diagonal extraction re-indexes cells into
    /// a single column, so it only supports the `Col` direction.
    pub fn partial_aggregate(
        input: Arc<Lop>,
        op: AggOp,
        direction: Direction,
        exec_type: ExecType,
        output: OutputParameters,
        position: SourcePosition,
    ) -> Result<Self, LopError> {
        if op == AggOp::DiagM2V && direction != Direction::Col {
            return Err(LopError::UnsupportedAggregate {
                op: format!("{op:?}"),
                direction: format!("{direction:?}"),
            });
        }
        let mut lop = Self::build(
            LopKind::PartialAggregate { op, direction },
            vec![input],
            exec_type,
            output,
            position,
        );
        lop.correction = Some(CorrectionLocation::for_partial(op, direction));
        Ok(lop)
    }

    pub fn group(
        input: Arc<Lop>,
        op: GroupOp,
        exec_type: ExecType,
        output: OutputParameters,
        position: SourcePosition,
    ) -> Self {
        Self::build(LopKind::Group { op }, vec![input], exec_type, output, position)
    }

    /// Final aggregate over grouped partials.
    pub fn aggregate(
        input: Arc<Lop>,
        op: AggOp,
        exec_type: ExecType,
        output: OutputParameters,
        position: SourcePosition,
    ) -> Result<Self, LopError> {
        if !matches!(input.kind, LopKind::Group { .. }) {
            return Err(LopError::ExpectedGroup(input.kind.label()));
        }
        Ok(Self::build(LopKind::Aggregate { op }, vec![input], exec_type, output, position))
    }

    pub fn with_correction(mut self, loc: CorrectionLocation) -> Self {
        self.correction = Some(loc);
        self
    }

    /// Number of lops reachable from this one (shared inputs counted once).
    pub fn count(&self) -> usize {
        let mut seen = Vec::new();
        self.walk(&mut |lop| {
            if !seen.contains(&lop.id) {
                seen.push(lop.id);
            }
        });
        seen.len()
    }

    /// Post-order walk (inputs before consumers).
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Lop)) {
        for input in &self.inputs {
            input.walk(f);
        }
        f(self);
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(
            f,
            "{:indent$}{} {} {}",
            "",
            self.kind.label(),
            self.exec_type,
            self.output,
            indent = depth * 2
        )?;
        if let Some(loc) = self.correction {
            write!(f, " corr={loc:?}")?;
        }
        writeln!(f)?;
        for input in &self.inputs {
            input.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Lop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

/// Lowered roots of a graph plus a structural fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalProgram {
    pub roots: Vec<Arc<Lop>>,
}

impl PhysicalProgram {
    pub fn new(roots: Vec<Arc<Lop>>) -> Self {
        Self { roots }
    }

    /// Stable across processes: lop ids are not part of the hash.
    pub fn fingerprint(&self) -> matfuse_core::error::Result<Hash256> {
        hash_serde(&self.roots)
    }
}

impl fmt::Display for PhysicalProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for root in &self.roots {
            write!(f, "{root}")?;
        }
        Ok(())
    }
}
