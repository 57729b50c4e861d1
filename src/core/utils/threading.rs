//! Fork-join task batches on top of Rayon.
//!
//! A [`TaskBatch`] runs a set of independent closures and returns only after
//! all of them completed, so every call is a join barrier. Tasks never share
//! mutable state: callers split their output into disjoint regions before
//! handing one region to each task.

use crate::core::error::{DrfError, Result};
use rayon::prelude::*;
use std::sync::Arc;

/// Executor for batches of independent tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskBatch {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl TaskBatch {
    /// Creates an executor. `num_threads == 0` uses the global Rayon pool.
    pub fn new(num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Ok(TaskBatch { pool: None });
        }
        if num_threads > num_cpus::get() * 2 {
            log::warn!(
                "num_threads ({}) is much larger than available cores ({})",
                num_threads,
                num_cpus::get()
            );
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("drf-worker-{}", i))
            .build()
            .map_err(|e| DrfError::threading(e.to_string()))?;
        Ok(TaskBatch {
            pool: Some(Arc::new(pool)),
        })
    }

    /// Number of worker threads tasks run on.
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Runs `op` inside this executor's pool.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Runs one task per item and returns the results in submission order.
    pub fn map<I, T, F>(&self, items: Vec<I>, task: F) -> Vec<T>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> T + Send + Sync,
    {
        self.install(|| items.into_par_iter().map(task).collect())
    }

    /// Like [`TaskBatch::map`], failing if any task failed. All tasks still run
    /// to completion; a failing task never cancels its siblings.
    pub fn try_map<I, T, F>(&self, items: Vec<I>, task: F) -> Result<Vec<T>>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> Result<T> + Send + Sync,
    {
        let results: Vec<Result<T>> = self.map(items, task);
        results.into_iter().collect()
    }

    /// Runs one task per item for its side effects on the item.
    pub fn for_each<I, F>(&self, items: Vec<I>, task: F)
    where
        I: Send,
        F: Fn(I) + Send + Sync,
    {
        self.install(|| items.into_par_iter().for_each(task))
    }
}
