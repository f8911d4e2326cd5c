//! Minimal YAML → HopGraph descriptor.
//!
//! Example:
//! ```yaml
//! config:
//!   optimization_type: heuristic
//! nodes:
//!   - input: { name: X, rows: 3, cols: 3, nnz: 5 }
//!   - reorg: { name: d, op: diag_m2v, input: X }
//!   - reorg: { name: t, op: transpose, input: d }
//! ```
//!
//! Nodes are declared in order; an operand must be declared before use.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use matfuse_core::config::OptimizerConfig;
use matfuse_core::dims::DataCharacteristics;
use matfuse_core::id::{HopId, SourcePosition};
use matfuse_core::types::{ExecType, OptimizationType};

use crate::error::{PlanError, Result};
use crate::hop::HopGraph;
use crate::reorg::ReorgOp;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDoc {
    #[serde(default)]
    pub config: Option<GraphConfig>,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub nodes: Vec<NodeDef>,
}

/// Optimizer overrides; unset fields keep the caller's base config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub optimization_type: Option<OptimizationType>,
    pub local_mem_budget_bytes: Option<u64>,
    pub forced_exec_type: Option<String>,
    pub local_dims_threshold: Option<u64>,
    pub block_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeDef {
    Input {
        name: String,
        #[serde(default)]
        rows: Option<u64>,
        #[serde(default)]
        cols: Option<u64>,
        #[serde(default)]
        nnz: Option<u64>,
    },
    Reorg {
        name: String,
        op: ReorgOp,
        input: String,
        #[serde(default)]
        exec_type: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ParsedGraph {
    pub graph: HopGraph,
    pub names: BTreeMap<String, HopId>,
}

impl ParsedGraph {
    pub fn id(&self, name: &str) -> Result<HopId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| PlanError::Graph(format!("no node named '{name}'")))
    }
}

fn parse_exec_type(s: &str) -> Result<ExecType> {
    s.parse::<ExecType>().map_err(PlanError::Graph)
}

fn apply_overrides(mut cfg: OptimizerConfig, over: &GraphConfig) -> Result<OptimizerConfig> {
    if let Some(t) = over.optimization_type {
        cfg.optimization_type = t;
    }
    if let Some(b) = over.local_mem_budget_bytes {
        cfg.local_mem_budget_bytes = b;
    }
    if let Some(et) = &over.forced_exec_type {
        cfg.forced_exec_type = Some(parse_exec_type(et)?);
    }
    if let Some(t) = over.local_dims_threshold {
        cfg.local_dims_threshold = t;
    }
    if let Some(bs) = over.block_size {
        cfg.default_block_size = bs;
    }
    Ok(cfg)
}

/// Parse a YAML graph descriptor on top of `base`.
pub fn parse_yaml_graph(yaml_src: &str, base: OptimizerConfig) -> Result<ParsedGraph> {
    let doc: GraphDoc =
        serde_yaml::from_str(yaml_src).map_err(|e| PlanError::Graph(e.to_string()))?;
    let cfg = match &doc.config {
        Some(over) => apply_overrides(base, over)?,
        None => base,
    };
    if doc.nodes.is_empty() {
        return Err(PlanError::Graph("graph has no nodes".into()));
    }

    let block = cfg.default_block_size;
    let mut graph = HopGraph::new(cfg);
    let mut names = BTreeMap::new();

    for (idx, node) in doc.nodes.into_iter().enumerate() {
        let line = idx as u32 + 1;
        let (name, id) = match node {
            NodeDef::Input {
                name,
                rows,
                cols,
                nnz,
            } => {
                let mut dc = DataCharacteristics::unknown(block);
                dc.set_dims(rows, cols);
                dc.nnz = nnz;
                let id = graph.add_input(name.clone(), dc);
                (name, id)
            }
            NodeDef::Reorg {
                name,
                op,
                input,
                exec_type,
            } => {
                let input_id = names
                    .get(&input)
                    .copied()
                    .ok_or_else(|| PlanError::Graph(format!("node '{name}': unknown input '{input}'")))?;
                let id = graph.add_reorg(op, &[input_id], SourcePosition::new(line, 1, line, 1))?;
                graph.set_name(id, name.clone())?;
                if let Some(et) = exec_type {
                    graph.set_forced_exec_type(id, Some(parse_exec_type(&et)?))?;
                }
                (name, id)
            }
        };
        if names.insert(name.clone(), id).is_some() {
            return Err(PlanError::Graph(format!("duplicate node name '{name}'")));
        }
    }

    Ok(ParsedGraph { graph, names })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"
config:
  optimization_type: heuristic
nodes:
  - input: { name: X, rows: 3, cols: 3, nnz: 5 }
  - reorg: { name: d, op: diag_m2v, input: X }
  - reorg: { name: t, op: transpose, input: d, exec_type: dist }
"#;

    #[test]
    fn parses_chain() {
        let parsed = parse_yaml_graph(SRC, OptimizerConfig::default()).unwrap();
        assert_eq!(parsed.graph.config().optimization_type, OptimizationType::Heuristic);
        let d = parsed.id("d").unwrap();
        let t = parsed.id("t").unwrap();
        let g = &parsed.graph;
        assert_eq!(g.hop(d).unwrap().characteristics().dims(), Some((3, 1)));
        assert_eq!(g.hop(t).unwrap().characteristics().dims(), Some((1, 3)));
        assert_eq!(g.hop(t).unwrap().forced_exec_type(), Some(ExecType::Distributed));
        assert_eq!(g.hop(t).unwrap().position().begin_line, 3);
        assert_eq!(g.sinks(), vec![t]);
    }

    #[test]
    fn rejects_unknown_input_and_duplicates() {
        let bad = "nodes:\n  - reorg: { name: t, op: transpose, input: Z }\n";
        assert!(matches!(
            parse_yaml_graph(bad, OptimizerConfig::default()),
            Err(PlanError::Graph(msg)) if msg.contains("unknown input 'Z'")
        ));
        let dup = "nodes:\n  - input: { name: X }\n  - input: { name: X }\n";
        assert!(parse_yaml_graph(dup, OptimizerConfig::default()).is_err());
        assert!(parse_yaml_graph("nodes: []", OptimizerConfig::default()).is_err());
    }
}
