//! Logical operator graph.
//!
//! Nodes live in an arena owned by [`HopGraph`] and are addressed by
//! [`HopId`]. Edges are stored twice: `inputs` (ordered operands) and
//! `parents` (consumers). Both are plain ids, so there is no ownership
//! between nodes and the graph can be dropped as a whole.

use std::fmt::Write as _;
use std::sync::Arc;

use matfuse_core::config::OptimizerConfig;
use matfuse_core::dims::DataCharacteristics;
use matfuse_core::id::{HopId, SourcePosition};
use matfuse_core::types::ExecType;

use crate::error::{PlanError, Result};
use crate::lops::Lop;
use crate::reorg::ReorgOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopKind {
    /// Leaf producing a matrix (a read or a precomputed operand).
    Input,
    Reorg(ReorgOp),
}

/// Lazily populated per-node results. `None` means "not computed yet".
#[derive(Debug, Clone, Default)]
pub struct HopCache {
    pub output_mem_estimate: Option<u64>,
    pub mem_estimate: Option<u64>,
    pub exec_type: Option<ExecType>,
    pub lops: Option<Arc<Lop>>,
}

#[derive(Debug, Clone)]
pub struct Hop {
    id: HopId,
    name: String,
    kind: HopKind,
    dc: DataCharacteristics,
    inputs: Vec<HopId>,
    parents: Vec<HopId>,
    position: SourcePosition,
    forced_exec_type: Option<ExecType>,
    requires_recompile: bool,
    cache: HopCache,
}

impl Hop {
    pub fn id(&self) -> HopId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &HopKind {
        &self.kind
    }

    pub fn characteristics(&self) -> &DataCharacteristics {
        &self.dc
    }

    pub(crate) fn characteristics_mut(&mut self) -> &mut DataCharacteristics {
        &mut self.dc
    }

    pub fn inputs(&self) -> &[HopId] {
        &self.inputs
    }

    pub fn parents(&self) -> &[HopId] {
        &self.parents
    }

    pub fn position(&self) -> SourcePosition {
        self.position
    }

    pub fn forced_exec_type(&self) -> Option<ExecType> {
        self.forced_exec_type
    }

    /// Placement must be re-evaluated on every run (dims were unknown when
    /// it was first decided).
    pub fn requires_recompile(&self) -> bool {
        self.requires_recompile
    }

    pub(crate) fn set_requires_recompile(&mut self, v: bool) {
        self.requires_recompile = v;
    }

    pub fn cache(&self) -> &HopCache {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut HopCache {
        &mut self.cache
    }

    pub fn op_string(&self) -> String {
        match &self.kind {
            HopKind::Input => format!("in({})", self.name),
            HopKind::Reorg(op) => op.op_string().to_string(),
        }
    }

    /// Reorgs can run under any placement.
    pub fn allows_all_exec_types(&self) -> bool {
        true
    }

    pub fn dims_known(&self) -> bool {
        self.dc.dims_known()
    }

    pub fn is_vector(&self) -> bool {
        self.dc.is_vector()
    }

    /// Both dims known and at most `threshold`.
    pub fn dims_below_threshold(&self, threshold: u64) -> bool {
        matches!(self.dc.dims(), Some((r, c)) if r <= threshold && c <= threshold)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HopGraph {
    nodes: Vec<Hop>,
    config: OptimizerConfig,
}

impl HopGraph {
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            nodes: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Replace the optimizer config. Cached estimates and placements of
    /// every node are dropped.
    pub fn set_config(&mut self, config: OptimizerConfig) {
        self.config = config;
        for h in &mut self.nodes {
            let cache = h.cache_mut();
            cache.output_mem_estimate = None;
            cache.mem_estimate = None;
            cache.exec_type = None;
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hop> {
        self.nodes.iter()
    }

    pub fn hop(&self, id: HopId) -> Result<&Hop> {
        self.nodes.get(id.index()).ok_or(PlanError::UnknownHop(id))
    }

    pub(crate) fn hop_mut(&mut self, id: HopId) -> Result<&mut Hop> {
        self.nodes.get_mut(id.index()).ok_or(PlanError::UnknownHop(id))
    }

    fn push(
        &mut self,
        name: String,
        kind: HopKind,
        dc: DataCharacteristics,
        inputs: Vec<HopId>,
        position: SourcePosition,
    ) -> HopId {
        let id = HopId::new(self.nodes.len() as u64);
        self.nodes.push(Hop {
            id,
            name,
            kind,
            dc,
            inputs,
            parents: Vec::new(),
            position,
            forced_exec_type: None,
            requires_recompile: false,
            cache: HopCache::default(),
        });
        id
    }

    pub fn add_input(&mut self, name: impl Into<String>, dc: DataCharacteristics) -> HopId {
        self.push(name.into(), HopKind::Input, dc, Vec::new(), SourcePosition::default())
    }

    /// Add a reorg node over `inputs` and derive its size information.
    ///
    /// The operand count is not checked here; a node with the wrong arity
    /// fails when it is lowered.
    pub fn add_reorg(
        &mut self,
        op: ReorgOp,
        inputs: &[HopId],
        position: SourcePosition,
    ) -> Result<HopId> {
        for input in inputs {
            self.hop(*input)?;
        }
        let block = self.config.default_block_size;
        let id = self.push(
            op.op_string().to_string(),
            HopKind::Reorg(op),
            DataCharacteristics::unknown(block),
            inputs.to_vec(),
            position,
        );
        for input in inputs {
            let parents = &mut self.hop_mut(*input)?.parents;
            if !parents.contains(&id) {
                parents.push(id);
            }
        }
        self.refresh_size_information(id)?;
        Ok(id)
    }

    pub fn set_name(&mut self, id: HopId, name: impl Into<String>) -> Result<()> {
        self.hop_mut(id)?.name = name.into();
        Ok(())
    }

    /// Replace the characteristics of a node (typically an input whose size
    /// became known). Dependent nodes are not refreshed automatically.
    pub fn set_characteristics(&mut self, id: HopId, dc: DataCharacteristics) -> Result<()> {
        self.hop_mut(id)?.dc = dc;
        Ok(())
    }

    pub fn set_forced_exec_type(&mut self, id: HopId, et: Option<ExecType>) -> Result<()> {
        self.hop_mut(id)?.forced_exec_type = et;
        Ok(())
    }

    /// Drop the cached size estimates and placement of a node. Lowering is
    /// kept: it is built at most once.
    pub fn invalidate_estimates(&mut self, id: HopId) -> Result<()> {
        let cache = self.hop_mut(id)?.cache_mut();
        cache.output_mem_estimate = None;
        cache.mem_estimate = None;
        cache.exec_type = None;
        Ok(())
    }

    /// Refresh sizes of every node in insertion order (inputs always precede
    /// their consumers).
    pub fn refresh_all(&mut self) -> Result<()> {
        for i in 0..self.nodes.len() {
            self.refresh_size_information(HopId::new(i as u64))?;
        }
        Ok(())
    }

    /// Nodes nothing consumes.
    pub fn sinks(&self) -> Vec<HopId> {
        self.nodes
            .iter()
            .filter(|h| h.parents.is_empty())
            .map(|h| h.id)
            .collect()
    }

    pub fn explain(&self) -> String {
        let mut out = String::new();
        for h in &self.nodes {
            let dims = match h.dc.dims() {
                Some((r, c)) => format!("{r}x{c}"),
                None => "?x?".to_string(),
            };
            let nnz = h.dc.nnz.map(|n| n.to_string()).unwrap_or_else(|| "?".into());
            let inputs: Vec<String> = h.inputs.iter().map(|i| i.get().to_string()).collect();
            let _ = write!(
                out,
                "({}) {} [{dims}, nnz={nnz}] in=[{}]",
                h.id.get(),
                h.op_string(),
                inputs.join(",")
            );
            if let Some(et) = h.cache.exec_type {
                let _ = write!(out, " {et}");
            }
            if let Some(mem) = h.cache.mem_estimate {
                let _ = write!(out, " mem={mem}");
            }
            if h.requires_recompile {
                let _ = write!(out, " recompile");
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_links_parents() {
        let mut g = HopGraph::default();
        let x = g.add_input("X", DataCharacteristics::new(3, 4, 1000, Some(6)));
        let t = g.add_reorg(ReorgOp::Transpose, &[x], SourcePosition::new(1, 5, 1, 9)).unwrap();
        let d = g.add_reorg(ReorgOp::DiagV2M, &[x], SourcePosition::default()).unwrap();
        assert_eq!(g.hop(x).unwrap().parents(), &[t, d]);
        assert_eq!(g.sinks(), vec![t, d]);
        assert_eq!(g.hop(t).unwrap().op_string(), "r(t)");
        assert_eq!(g.hop(t).unwrap().position().begin_column, 5);
        assert!(g.hop(t).unwrap().allows_all_exec_types());
        assert_eq!(g.hop(d).unwrap().characteristics().dims(), Some((4, 4)));
    }

    #[test]
    fn unknown_input_is_rejected() {
        let mut g = HopGraph::default();
        let err = g
            .add_reorg(ReorgOp::Transpose, &[HopId::new(7)], SourcePosition::default())
            .unwrap_err();
        assert!(matches!(err, PlanError::UnknownHop(id) if id == HopId::new(7)));
    }

    #[test]
    fn explain_lists_nodes() {
        let mut g = HopGraph::default();
        let x = g.add_input("X", DataCharacteristics::new(3, 3, 1000, None));
        let r = g.add_reorg(ReorgOp::DiagM2V, &[x], SourcePosition::default()).unwrap();
        g.choose_placement(r).unwrap();
        let text = g.explain();
        assert!(text.contains("in(X) [3x3, nnz=?]"));
        assert!(text.contains("r(diagM2V) [3x1, nnz=?] in=[0] LOCAL"));
    }

    #[test]
    fn threshold_check_needs_known_dims() {
        let mut g = HopGraph::default();
        let x = g.add_input("X", DataCharacteristics::unknown(1000));
        let y = g.add_input("Y", DataCharacteristics::new(10, 2000, 1000, None));
        assert!(!g.hop(x).unwrap().dims_below_threshold(2000));
        assert!(g.hop(y).unwrap().dims_below_threshold(2000));
        assert!(!g.hop(y).unwrap().dims_below_threshold(1999));
    }
}
