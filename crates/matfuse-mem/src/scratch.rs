//! Per-task scratch vectors for generated row logic.
//!
//! A kernel that declares `k` intermediate vectors gets an arena with `k`
//! vectors of the primary row length `n` and, if a second dimension `n2` is
//! known, `k` vectors of length `n2`. Vectors are handed out round-robin per
//! length, matching how generated code cycles through its temporaries.
//!
//! The arena is acquired right before a row loop and dropped right after; the
//! budget guard releases its bytes on drop, including on early return.

use matfuse_core::budget::BudgetGuard;

use crate::error::{Error, Result};
use crate::guard::{BudgetGuardImpl, MemoryBudgetImpl};

struct VectorRing {
    len: usize,
    bufs: Vec<Vec<f64>>,
    next: usize,
}

impl VectorRing {
    fn new(len: usize, count: usize) -> Self {
        Self {
            len,
            bufs: (0..count).map(|_| vec![0.0; len]).collect(),
            next: 0,
        }
    }

    fn next_slot(&mut self) -> Option<usize> {
        if self.bufs.is_empty() {
            return None;
        }
        let slot = self.next % self.bufs.len();
        self.next = (slot + 1) % self.bufs.len();
        Some(slot)
    }
}

pub struct ScratchArena {
    rings: Vec<VectorRing>,
    guard: Option<BudgetGuardImpl>,
}

impl ScratchArena {
    /// Arena without any vectors (kernels that need no scratch).
    pub fn empty() -> Self {
        Self {
            rings: Vec::new(),
            guard: None,
        }
    }

    /// Acquire `num_vectors` vectors of length `len` (and of `len2`, if given)
    /// against `budget`.
    pub fn acquire(
        budget: &MemoryBudgetImpl,
        num_vectors: usize,
        len: usize,
        len2: Option<usize>,
    ) -> Result<Self> {
        if num_vectors == 0 {
            return Ok(Self::empty());
        }
        let mut lens = vec![len];
        if let Some(l2) = len2.filter(|l2| *l2 != len && *l2 > 0) {
            lens.push(l2);
        }
        let bytes = lens.iter().map(|l| l * num_vectors * 8).sum();
        let guard = budget.acquire(bytes, "scratch")?;

        #[cfg(feature = "tracing")]
        tracing::trace!(num_vectors, len, ?len2, bytes, "acquired scratch arena");

        Ok(Self {
            rings: lens
                .into_iter()
                .map(|l| VectorRing::new(l, num_vectors))
                .collect(),
            guard: Some(guard),
        })
    }

    /// Bytes accounted against the budget.
    pub fn bytes(&self) -> usize {
        self.guard.as_ref().map(|g| g.bytes()).unwrap_or(0)
    }

    /// Lengths this arena can serve.
    pub fn lengths(&self) -> Vec<usize> {
        self.rings.iter().map(|r| r.len).collect()
    }

    fn ring_mut(&mut self, len: usize) -> Result<&mut VectorRing> {
        let available = self.lengths();
        self.rings
            .iter_mut()
            .find(|r| r.len == len)
            .ok_or(Error::NoScratchVector { len, available })
    }

    /// Next vector of length `len`, optionally zeroed.
    pub fn vector(&mut self, len: usize, reset: bool) -> Result<&mut [f64]> {
        let ring = self.ring_mut(len)?;
        let slot = ring
            .next_slot()
            .ok_or(Error::NoScratchVector { len, available: Vec::new() })?;
        let buf = &mut ring.bufs[slot];
        if reset {
            buf.fill(0.0);
        }
        Ok(buf.as_mut_slice())
    }
}
