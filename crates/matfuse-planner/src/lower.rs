//! Lowering: logical node → physical lops, memoized per node.

use std::sync::Arc;

use matfuse_core::id::HopId;
use matfuse_core::types::ExecType;

use crate::error::{LopError, PlanError, Result};
use crate::hop::{HopGraph, HopKind};
use crate::lops::{
    AggOp, CorrectionLocation, Direction, GroupOp, Lop, OutputParameters, PhysicalProgram,
};
use crate::reorg::ReorgOp;

impl HopGraph {
    /// Physical plan of `id`, built on first call and returned as the same
    /// `Arc` afterwards.
    pub fn construct_lops(&mut self, id: HopId) -> Result<Arc<Lop>> {
        let hop = self.hop(id)?;
        if let Some(lop) = &hop.cache().lops {
            return Ok(Arc::clone(lop));
        }

        let kind = *hop.kind();
        let lop = match kind {
            HopKind::Input => Arc::new(Lop::data(
                hop.name(),
                OutputParameters::from(hop.characteristics()),
                hop.position(),
            )),
            HopKind::Reorg(op) => self.lower_reorg(id, op)?,
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(hop = %id, lop = %lop.id, kind = %lop.kind.label(), "lowered");

        self.hop_mut(id)?.cache_mut().lops = Some(Arc::clone(&lop));
        Ok(lop)
    }

    fn lower_reorg(&mut self, id: HopId, op: ReorgOp) -> Result<Arc<Lop>> {
        let hop = self.hop(id)?;
        let inputs = hop.inputs().to_vec();
        let output = OutputParameters::from(hop.characteristics());
        let position = hop.position();

        if inputs.len() != op.arity() {
            return Err(self.lowering_error(
                id,
                format!("{op} expects {} input(s), got {}", op.arity(), inputs.len()),
                None,
            ));
        }
        let input = self.construct_lops(inputs[0])?;

        let lop = match op {
            ReorgOp::Transpose | ReorgOp::DiagV2M => {
                let et = self.choose_placement(id)?;
                Lop::transform(input, op.transform_op(), et, output, position)
            }
            ReorgOp::DiagM2V => {
                // extract → group → sum; at most one value reaches each
                // output cell, so the sum runs without compensation.
                let partial = Lop::partial_aggregate(
                    input,
                    AggOp::DiagM2V,
                    Direction::Col,
                    ExecType::Distributed,
                    output,
                    position,
                )
                .map_err(|e| self.lowering_error(id, "partial aggregate".into(), Some(e)))?;
                let group = Lop::group(
                    Arc::new(partial),
                    GroupOp::Sort,
                    ExecType::Distributed,
                    output,
                    position,
                );
                Lop::aggregate(
                    Arc::new(group),
                    AggOp::Sum,
                    ExecType::Distributed,
                    output,
                    position,
                )
                .map_err(|e| self.lowering_error(id, "aggregate".into(), Some(e)))?
                .with_correction(CorrectionLocation::None)
            }
        };
        Ok(Arc::new(lop))
    }

    fn lowering_error(&self, id: HopId, msg: String, source: Option<LopError>) -> PlanError {
        match self.hop(id) {
            Ok(hop) => PlanError::Lowering {
                hop: id,
                name: hop.name().to_string(),
                position: hop.position(),
                msg,
                source,
            },
            Err(e) => e,
        }
    }

    /// Lower every sink node and wrap the roots.
    pub fn lower_all(&mut self) -> Result<PhysicalProgram> {
        let mut roots = Vec::new();
        for sink in self.sinks() {
            roots.push(self.construct_lops(sink)?);
        }
        Ok(PhysicalProgram::new(roots))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lops::{LopKind, TransformOp};
    use matfuse_core::config::OptimizerConfig;
    use matfuse_core::dims::DataCharacteristics;
    use matfuse_core::id::SourcePosition;

    fn graph() -> HopGraph {
        HopGraph::new(OptimizerConfig::default())
    }

    #[test]
    fn lowering_is_memoized() {
        let mut g = graph();
        let x = g.add_input("X", DataCharacteristics::new(2, 3, 1000, Some(3)));
        let t = g.add_reorg(ReorgOp::Transpose, &[x], SourcePosition::default()).unwrap();
        let a = g.construct_lops(t).unwrap();
        let b = g.construct_lops(t).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.kind, LopKind::Transform { op: TransformOp::Transpose });
        assert_eq!(a.exec_type, ExecType::Local);
        assert_eq!((a.output.rows, a.output.cols, a.output.nnz), (Some(3), Some(2), Some(3)));
        assert!(Arc::ptr_eq(&a.inputs[0], &g.construct_lops(x).unwrap()));
    }

    #[test]
    fn diag_m2v_lowers_to_three_stage_chain() {
        let mut g = graph();
        let x = g.add_input("X", DataCharacteristics::new(3, 3, 1000, Some(5)));
        let d = g.add_reorg(ReorgOp::DiagM2V, &[x], SourcePosition::default()).unwrap();
        let agg = g.construct_lops(d).unwrap();

        assert_eq!(agg.kind, LopKind::Aggregate { op: AggOp::Sum });
        assert_eq!(agg.exec_type, ExecType::Distributed);
        assert_eq!(agg.correction, Some(CorrectionLocation::None));
        let group = &agg.inputs[0];
        assert_eq!(group.kind, LopKind::Group { op: GroupOp::Sort });
        let partial = &group.inputs[0];
        assert_eq!(
            partial.kind,
            LopKind::PartialAggregate { op: AggOp::DiagM2V, direction: Direction::Col }
        );
        assert_eq!(partial.correction, Some(CorrectionLocation::None));
        for lop in [&agg, group, partial] {
            assert_eq!((lop.output.rows, lop.output.cols), (Some(3), Some(1)));
        }
        assert_eq!(agg.count(), 4);
    }

    #[test]
    fn wrong_arity_is_a_lowering_error() {
        let mut g = graph();
        let x = g.add_input("X", DataCharacteristics::new(2, 2, 1000, None));
        let y = g.add_input("Y", DataCharacteristics::new(2, 2, 1000, None));
        let pos = SourcePosition::new(4, 1, 4, 12);
        let t = g.add_reorg(ReorgOp::Transpose, &[x, y], pos).unwrap();
        let err = g.construct_lops(t).unwrap_err();
        match err {
            PlanError::Lowering { hop, position, ref msg, .. } => {
                assert_eq!(hop, t);
                assert_eq!(position, pos);
                assert!(msg.contains("got 2"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(g.hop(t).unwrap().cache().lops.is_none());

        let none = g.add_reorg(ReorgOp::DiagV2M, &[], pos).unwrap();
        assert!(matches!(g.construct_lops(none), Err(PlanError::Lowering { .. })));
    }

    #[test]
    fn lower_all_collects_sinks() {
        let mut g = graph();
        let x = g.add_input("X", DataCharacteristics::new(4, 1, 1000, Some(4)));
        g.add_reorg(ReorgOp::DiagV2M, &[x], SourcePosition::default()).unwrap();
        let y = g.add_input("Y", DataCharacteristics::new(4, 4, 1000, None));
        g.add_reorg(ReorgOp::DiagM2V, &[y], SourcePosition::default()).unwrap();
        let program = g.lower_all().unwrap();
        assert_eq!(program.roots.len(), 2);
        assert!(program.to_string().contains("Transform(DiagV2M) LOCAL [4x4"));
        assert_eq!(program.fingerprint().unwrap(), g.lower_all().unwrap().fingerprint().unwrap());
    }
}
