//! Reorg family: transpose and diagonal vector↔matrix.
//!
//! Each kind maps to a shape formula, an output-size formula and a lowering
//! strategy. The graph-level entry points (`refresh_size_information`,
//! `estimate_output_memory`, `compute_mem_estimate`, `choose_placement`)
//! live on [`HopGraph`] because they need to read the node's inputs.

use serde::{Deserialize, Serialize};
use std::fmt;

use matfuse_core::dims::DataCharacteristics;
use matfuse_core::id::HopId;
use matfuse_core::types::{ExecType, OptimizationType};

use crate::cost::{estimate_size, estimate_size_exact_sparsity};
use crate::error::{PlanError, Result};
use crate::hop::{HopGraph, HopKind};
use crate::lops::TransformOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorgOp {
    Transpose,
    /// Vector to diagonal matrix.
    #[serde(rename = "diag_v2m")]
    DiagV2M,
    /// Diagonal of a square matrix as a column vector.
    #[serde(rename = "diag_m2v")]
    DiagM2V,
}

impl ReorgOp {
    /// Number of inputs a node of this kind must have.
    pub const fn arity(self) -> usize {
        1
    }

    pub fn op_string(self) -> &'static str {
        match self {
            ReorgOp::Transpose => "r(t)",
            ReorgOp::DiagV2M => "r(diagV2M)",
            ReorgOp::DiagM2V => "r(diagM2V)",
        }
    }

    pub fn transform_op(self) -> TransformOp {
        match self {
            ReorgOp::Transpose => TransformOp::Transpose,
            ReorgOp::DiagV2M => TransformOp::DiagV2M,
            ReorgOp::DiagM2V => TransformOp::DiagM2V,
        }
    }

    /// Output dims and nnz derivable from the input without execution.
    pub fn output_characteristics(
        self,
        input: &DataCharacteristics,
    ) -> (Option<u64>, Option<u64>, Option<u64>) {
        match self {
            ReorgOp::Transpose => (input.cols, input.rows, input.nnz),
            ReorgOp::DiagV2M => {
                let k = match (input.rows, input.cols) {
                    (Some(r), Some(c)) => Some(r.max(c)),
                    _ => None,
                };
                (k, k, input.nnz)
            }
            ReorgOp::DiagM2V => (input.rows, Some(1), None),
        }
    }

    /// Output size in bytes given the node's own dims and its input.
    /// `None` when either shape is unknown.
    pub fn output_mem_estimate(
        self,
        own: &DataCharacteristics,
        input: &DataCharacteristics,
    ) -> Option<u64> {
        let (rows, cols) = own.dims()?;
        let (in_rows, in_cols) = input.dims()?;
        let est = match self {
            ReorgOp::Transpose => {
                let sparsity = match input.nnz {
                    Some(nnz) if nnz > 0 && in_rows.saturating_mul(in_cols) > 0 => {
                        nnz as f64 / (in_rows as f64 * in_cols as f64)
                    }
                    _ => 1.0,
                };
                estimate_size_exact_sparsity(rows, cols, sparsity)
            }
            ReorgOp::DiagV2M => {
                let k = rows.max(1);
                estimate_size_exact_sparsity(rows, cols, 1.0 / k as f64)
            }
            ReorgOp::DiagM2V => estimate_size(rows, cols, None),
        };
        Some(est)
    }
}

impl fmt::Display for ReorgOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.op_string())
    }
}

impl HopGraph {
    fn reorg_parts(&self, id: HopId) -> Result<(ReorgOp, Option<HopId>)> {
        let hop = self.hop(id)?;
        match hop.kind() {
            HopKind::Reorg(op) => Ok((*op, hop.inputs().first().copied())),
            HopKind::Input => Err(PlanError::Graph(format!("{id} is not a reorg node"))),
        }
    }

    /// Recompute output dims and nnz from the current input characteristics.
    /// Input nodes keep whatever characteristics they were given.
    pub fn refresh_size_information(&mut self, id: HopId) -> Result<()> {
        if let HopKind::Input = self.hop(id)?.kind() {
            return Ok(());
        }
        let (op, input) = self.reorg_parts(id)?;
        let Some(input) = input else {
            return Ok(());
        };
        let input_dc = *self.hop(input)?.characteristics();
        let (rows, cols, nnz) = op.output_characteristics(&input_dc);
        let dc = self.hop_mut(id)?.characteristics_mut();
        dc.set_dims(rows, cols);
        dc.nnz = nnz;
        Ok(())
    }

    /// Conservative size of the node's output; the configured default when
    /// the shape is unknown. The result is recorded on the node.
    pub fn estimate_output_memory(&mut self, id: HopId) -> Result<u64> {
        let default_size = self.config().default_size_bytes;
        let hop = self.hop(id)?;
        let est = match hop.kind() {
            HopKind::Input => {
                let dc = hop.characteristics();
                dc.dims()
                    .map(|(r, c)| estimate_size(r, c, dc.nnz))
                    .unwrap_or(default_size)
            }
            HopKind::Reorg(op) => {
                let own = *hop.characteristics();
                let input = match hop.inputs().first() {
                    Some(input) => Some(*self.hop(*input)?.characteristics()),
                    None => None,
                };
                input
                    .and_then(|input| op.output_mem_estimate(&own, &input))
                    .unwrap_or(default_size)
            }
        };
        self.hop_mut(id)?.cache_mut().output_mem_estimate = Some(est);
        Ok(est)
    }

    /// Operation memory: own output plus the outputs of all inputs.
    /// Saturates at the default size when any shape is unknown.
    pub fn compute_mem_estimate(&mut self, id: HopId) -> Result<u64> {
        let inputs = self.hop(id)?.inputs().to_vec();
        let mut total = self.estimate_output_memory(id)?;
        for input in inputs {
            total = total.saturating_add(self.estimate_output_memory(input)?);
        }
        self.hop_mut(id)?.cache_mut().mem_estimate = Some(total);
        Ok(total)
    }

    /// Decide where the node runs.
    ///
    /// A cached decision is returned unless the node was flagged for
    /// re-evaluation (unknown dims) or [`HopGraph::invalidate_estimates`] was
    /// called.
    pub fn choose_placement(&mut self, id: HopId) -> Result<ExecType> {
        {
            let hop = self.hop(id)?;
            if let (Some(et), false) = (hop.cache().exec_type, hop.requires_recompile()) {
                return Ok(et);
            }
        }

        let hop = self.hop(id)?;
        let is_input = matches!(hop.kind(), HopKind::Input);
        let forced = hop.forced_exec_type().or(self.config().forced_exec_type);
        let dims_known = hop.dims_known();
        let input = hop.inputs().first().copied();
        if is_input {
            self.hop_mut(id)?.cache_mut().exec_type = Some(ExecType::Local);
            return Ok(ExecType::Local);
        }
        let input_dc = match input {
            Some(input) => Some(*self.hop(input)?.characteristics()),
            None => None,
        };

        let et = match forced {
            Some(et) => et,
            None => {
                if !dims_known && self.config().allow_dyn_recompilation {
                    self.hop_mut(id)?.set_requires_recompile(true);
                }
                match self.config().optimization_type {
                    OptimizationType::MemoryBased => {
                        let mem = self.compute_mem_estimate(id)?;
                        if mem < self.config().local_mem_budget_bytes {
                            ExecType::Local
                        } else {
                            ExecType::Distributed
                        }
                    }
                    OptimizationType::Heuristic => {
                        let threshold = self.config().local_dims_threshold;
                        let small = input_dc.is_some_and(|dc| {
                            dc.is_vector()
                                || matches!(dc.dims(), Some((r, c)) if r <= threshold && c <= threshold)
                        });
                        if small {
                            ExecType::Local
                        } else {
                            ExecType::Distributed
                        }
                    }
                }
            }
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(hop = %id, placement = %et, forced = forced.is_some(), "chose placement");

        self.hop_mut(id)?.cache_mut().exec_type = Some(et);
        Ok(et)
    }
}
