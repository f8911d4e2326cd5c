//! Compiler and runtime configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::types::{ExecType, OptimizationType};

/// Default block size (rows and cols per block) for distributed placements.
pub const DEFAULT_BLOCK_SIZE: u32 = 1000;

/// Knobs consulted by logical nodes while estimating memory and picking a placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Memory-based vs. heuristic placement.
    pub optimization_type: OptimizationType,

    /// Local (in-process) memory budget in bytes. Operators whose estimate is
    /// below this run locally when `optimization_type` is memory-based.
    pub local_mem_budget_bytes: u64,

    /// Force a placement regardless of estimates.
    pub forced_exec_type: Option<ExecType>,

    /// Mark nodes with unknown dims for re-evaluation at every run.
    pub allow_dyn_recompilation: bool,

    /// Heuristic mode: both dims at or below this run locally.
    pub local_dims_threshold: u64,

    /// Block size hint assigned to new nodes.
    pub default_block_size: u32,

    /// Conservative size returned for outputs whose shape is unknown.
    pub default_size_bytes: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            optimization_type: OptimizationType::MemoryBased,
            local_mem_budget_bytes: 2 * 1024 * 1024 * 1024, // 2 GiB default
            forced_exec_type: None,
            allow_dyn_recompilation: true,
            local_dims_threshold: 2000,
            default_block_size: DEFAULT_BLOCK_SIZE,
            default_size_bytes: u64::MAX,
        }
    }
}

impl OptimizerConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `MATFUSE_OPT_TYPE`: `memory` or `heuristic`
    /// - `MATFUSE_LOCAL_MEM_BUDGET`: local memory budget in bytes
    /// - `MATFUSE_FORCE_EXEC_TYPE`: `local` or `dist`
    /// - `MATFUSE_DYN_RECOMPILE`: `true`/`false`
    /// - `MATFUSE_LOCAL_DIMS_THRESHOLD`: heuristic dims threshold
    /// - `MATFUSE_BLOCK_SIZE`: default block size
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("MATFUSE_OPT_TYPE") {
            if let Ok(v) = s.parse::<OptimizationType>() {
                cfg.optimization_type = v;
            }
        }

        if let Ok(s) = std::env::var("MATFUSE_LOCAL_MEM_BUDGET") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.local_mem_budget_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("MATFUSE_FORCE_EXEC_TYPE") {
            if let Ok(v) = s.parse::<ExecType>() {
                cfg.forced_exec_type = Some(v);
            }
        }

        if let Ok(s) = std::env::var("MATFUSE_DYN_RECOMPILE") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.allow_dyn_recompilation = v;
            }
        }

        if let Ok(s) = std::env::var("MATFUSE_LOCAL_DIMS_THRESHOLD") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.local_dims_threshold = v;
            }
        }

        if let Ok(s) = std::env::var("MATFUSE_BLOCK_SIZE") {
            if let Ok(v) = s.parse::<u32>() {
                cfg.default_block_size = v;
            }
        }

        cfg
    }
}

/// Runtime knobs for fused kernel execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Below this many input cells (primary + side inputs) parallel runs fall
    /// back to serial execution.
    pub par_numcell_threshold: u64,

    /// Column aggregation runs in parallel only if the per-task partial
    /// accumulators (8 bytes * cols * k) stay below this cap.
    pub par_col_agg_mem_threshold: u64,

    /// Row alignment of parallel partitions over compressed inputs.
    pub compressed_block_rows: usize,

    /// Hard cap for the scratch vectors of a single task (bytes). Every
    /// parallel task gets its own budget of this size.
    pub scratch_cap_bytes: usize,

    /// Upper bound for the requested thread count.
    pub max_parallel_tasks: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            par_numcell_threshold: 1024 * 1024,
            par_col_agg_mem_threshold: 2 * 1024 * 1024, // 2 MiB
            compressed_block_rows: 65536,
            scratch_cap_bytes: 256 * 1024 * 1024, // 256 MiB
            max_parallel_tasks: num_cpus::get().max(1),
        }
    }
}

impl ExecConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `MATFUSE_PAR_NUMCELL_THRESHOLD`
    /// - `MATFUSE_PAR_COL_AGG_MEM`
    /// - `MATFUSE_COMPRESSED_BLOCK_ROWS`
    /// - `MATFUSE_SCRATCH_CAP_BYTES`
    /// - `MATFUSE_MAX_PARALLEL_TASKS`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("MATFUSE_PAR_NUMCELL_THRESHOLD") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.par_numcell_threshold = v;
            }
        }

        if let Ok(s) = std::env::var("MATFUSE_PAR_COL_AGG_MEM") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.par_col_agg_mem_threshold = v;
            }
        }

        if let Ok(s) = std::env::var("MATFUSE_COMPRESSED_BLOCK_ROWS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.compressed_block_rows = v.max(1);
            }
        }

        if let Ok(s) = std::env::var("MATFUSE_SCRATCH_CAP_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.scratch_cap_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("MATFUSE_MAX_PARALLEL_TASKS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_parallel_tasks = v.max(1);
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let opt = OptimizerConfig::default();
        assert_eq!(opt.optimization_type, OptimizationType::MemoryBased);
        assert!(opt.forced_exec_type.is_none());
        assert!(opt.default_size_bytes > opt.local_mem_budget_bytes);

        let exec = ExecConfig::default();
        assert_eq!(exec.par_numcell_threshold, 1024 * 1024);
        assert!(exec.max_parallel_tasks >= 1);
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = OptimizerConfig {
            forced_exec_type: Some(ExecType::Distributed),
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: OptimizerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.forced_exec_type, Some(ExecType::Distributed));
    }
}
