//! Worker pools and the fan-out/fan-in task group.
//!
//! One rayon pool is built per degree of parallelism and reused for the
//! lifetime of the process. A [`TaskGroup`] runs a batch of tasks on such a
//! pool and blocks the caller until all of them finished or one failed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{ExecError, KernelError};

static POOLS: Lazy<Mutex<HashMap<usize, Arc<ThreadPool>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Shared pool with `k` worker threads.
pub fn pool(k: usize) -> Result<Arc<ThreadPool>, ExecError> {
    let k = k.max(1);
    let mut pools = POOLS
        .lock()
        .map_err(|_| ExecError::Pool("pool registry poisoned".into()))?;
    if let Some(p) = pools.get(&k) {
        return Ok(Arc::clone(p));
    }
    let p = ThreadPoolBuilder::new()
        .num_threads(k)
        .thread_name(move |i| format!("matfuse-{k}-{i}"))
        .build()
        .map_err(|e| ExecError::Pool(e.to_string()))?;
    let p = Arc::new(p);
    pools.insert(k, Arc::clone(&p));
    Ok(p)
}

/// Bounded fan-out of independent tasks.
pub struct TaskGroup {
    pool: Arc<ThreadPool>,
}

impl TaskGroup {
    pub fn new(k: usize) -> Result<Self, ExecError> {
        Ok(Self { pool: pool(k)? })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `f` over every item, returning results in item order. The first
    /// failing task (by index) is reported; other results are discarded.
    pub fn run<I, T, F>(&self, items: Vec<I>, f: F) -> Result<Vec<T>, ExecError>
    where
        I: Send,
        T: Send,
        F: Fn(usize, I) -> Result<T, KernelError> + Sync,
    {
        let results: Vec<Result<T, KernelError>> = self.pool.install(|| {
            items
                .into_par_iter()
                .enumerate()
                .map(|(task, item)| f(task, item))
                .collect()
        });
        results
            .into_iter()
            .enumerate()
            .map(|(task, r)| r.map_err(|source| ExecError::Task { task, source }))
            .collect()
    }
}
