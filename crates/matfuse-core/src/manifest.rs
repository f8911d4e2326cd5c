//! Deterministic run manifest for executed plans.
//!
//! The local executor emits one after a successful run: identical plan and
//! inputs must give identical `plan_hash`, `inputs_digest` and
//! `outputs_digest`; only the timestamps differ between runs.

use serde::{Deserialize, Serialize};

use crate::hash::Hash256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Fingerprint of the physical plan.
    pub plan_hash: Hash256,

    /// Engine version string for provenance.
    pub engine_version: String,

    /// Digest over the bound inputs, in name order.
    pub inputs_digest: Option<Hash256>,

    /// Digest over the root results, in root order.
    pub outputs_digest: Option<Hash256>,

    /// Number of physical operators evaluated (shared nodes count once).
    pub lops_executed: usize,

    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl RunManifest {
    pub fn new(plan_hash: Hash256, started_ms: u64) -> Self {
        Self {
            plan_hash,
            engine_version: crate::VERSION.to_string(),
            inputs_digest: None,
            outputs_digest: None,
            lops_executed: 0,
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn with_inputs_digest(mut self, digest: Hash256) -> Self {
        self.inputs_digest = Some(digest);
        self
    }

    pub fn finish(
        mut self,
        finished_ms: u64,
        lops_executed: usize,
        outputs_digest: Option<Hash256>,
    ) -> Self {
        self.finished_ms = finished_ms;
        self.lops_executed = lops_executed;
        self.outputs_digest = outputs_digest;
        self
    }

    /// Same plan, same inputs, same outputs.
    pub fn same_results(&self, other: &RunManifest) -> bool {
        self.plan_hash == other.plan_hash
            && self.inputs_digest == other.inputs_digest
            && self.outputs_digest == other.outputs_digest
    }
}
