//! The coordinator side of a buffer build.

use crate::cluster::{dispatch, KeyValueStore, NodeId, RemoteDispatch};
use crate::config::{ForestConfig, StratumOverride};
use crate::core::constants::MAX_DISPATCH_ATTEMPTS;
use crate::core::error::{DrfError, Result};
use crate::core::types::RowCount;
use crate::core::utils::threading::TaskBatch;
use crate::dataset::descriptor::DatasetDescriptor;
use crate::dataset::histogram::ChunkHistograms;
use crate::dataset::report::BuildReport;
use crate::dataset::stratify::{StratificationPlan, Stratifier};
use crate::forest::service::{NodeTask, TaskReply};
use crate::forest::{participating_nodes, trees_for_node, validate_input};
use serde::{Deserialize, Serialize};

/// Outcome of a cluster-wide buffer build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    /// Number of classes of the class column
    pub num_classes: usize,
    /// Rows per class over the whole dataset
    pub global_counts: Vec<RowCount>,
    /// Quotas every node was given; `None` without stratification
    pub plan: Option<StratificationPlan>,
    /// One report per participating node, by node index
    pub nodes: Vec<BuildReport>,
}

impl JobReport {
    /// Trees grown across the cluster
    pub fn total_trees(&self) -> usize {
        self.nodes.iter().map(|n| n.trees).sum()
    }

    /// Report of `node`
    pub fn node(&self, node: NodeId) -> Option<&BuildReport> {
        self.nodes.iter().find(|r| r.node == Some(node))
    }
}

/// Drives the build of every node's training buffer for one dataset.
#[derive(Debug, Clone)]
pub struct ForestJob {
    descriptor: DatasetDescriptor,
    config: ForestConfig,
    batch: TaskBatch,
}

impl ForestJob {
    /// Creates a job. Dispatches run on a pool sized by `config.num_threads`.
    pub fn new(descriptor: DatasetDescriptor, config: ForestConfig) -> Result<Self> {
        let batch = TaskBatch::new(config.num_threads)?;
        Ok(ForestJob {
            descriptor,
            config,
            batch,
        })
    }

    /// Training configuration
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Runs the build.
    ///
    /// Input errors are returned before any task is sent. Node failures
    /// that remain after [`MAX_DISPATCH_ATTEMPTS`] retries fail the job.
    pub fn run(
        &self,
        store: &dyn KeyValueStore,
        dispatcher: &dyn RemoteDispatch,
    ) -> Result<JobReport> {
        let num_classes = validate_input(&self.descriptor, &self.config)?;
        let nodes = participating_nodes(store, &self.descriptor);
        if nodes.is_empty() {
            return Err(DrfError::dataset(format!(
                "dataset {} has no chunks",
                self.descriptor.key
            )));
        }
        log::info!(
            "building training buffers of {} ({} classes) on {} nodes",
            self.descriptor.key,
            num_classes,
            nodes.len()
        );

        let histogram_task = NodeTask::ClassHistogram {
            descriptor: self.descriptor.clone(),
            class_column: self.config.class_column,
        };
        let parts = self.batch.try_map(nodes.clone(), |node| {
            match self.call(dispatcher, node, &histogram_task)? {
                TaskReply::Histogram(h) => Ok(h),
                other => Err(unexpected(node, &other)),
            }
        })?;
        store.write_barrier();
        let global = ChunkHistograms::merge(parts)?;
        let global_counts = global.totals();

        let plan = self.config.stratify.then(|| {
            let strata: &[StratumOverride] = &self.config.strata;
            Stratifier::new(self.config.sample_fraction, nodes.len(), strata).plan(&global_counts)
        });

        let builds: Vec<(NodeId, NodeTask)> = nodes
            .iter()
            .enumerate()
            .map(|(i, &node)| {
                let task = NodeTask::BuildBuffer {
                    descriptor: self.descriptor.clone(),
                    config: self.config.clone(),
                    global: global.clone(),
                    plan: plan.clone(),
                    trees: trees_for_node(self.config.num_trees, nodes.len(), i),
                };
                (node, task)
            })
            .collect();
        let reports = self.batch.try_map(builds, |(node, task)| {
            match self.call(dispatcher, node, &task)? {
                TaskReply::Built(report) => Ok(report),
                other => Err(unexpected(node, &other)),
            }
        })?;

        Ok(JobReport {
            num_classes,
            global_counts,
            plan,
            nodes: reports,
        })
    }

    fn call(
        &self,
        dispatcher: &dyn RemoteDispatch,
        node: NodeId,
        task: &NodeTask,
    ) -> Result<TaskReply> {
        let mut attempt = 1;
        loop {
            match dispatch(dispatcher, node, task) {
                Err(e) if e.is_retryable() && attempt < MAX_DISPATCH_ATTEMPTS => {
                    log::warn!("task on {} failed (attempt {}): {}", node, attempt, e);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

fn unexpected(node: NodeId, reply: &TaskReply) -> DrfError {
    let kind = match reply {
        TaskReply::Histogram(_) => "histogram",
        TaskReply::Built(_) => "build report",
    };
    DrfError::remote(node.index(), format!("unexpected {} reply", kind))
}
