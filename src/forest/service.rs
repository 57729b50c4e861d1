//! Per-node task handling.
//!
//! Every node runs a [`NodeService`]. It answers two tasks: counting the
//! classes of the chunks the node is home to, and building the node's
//! training buffer once the coordinator has merged those counts.

use crate::cluster::{ChunkKey, InMemoryCluster, KeyValueStore, NodeId, TaskEnvelope};
use crate::config::ForestConfig;
use crate::core::error::{DrfError, Result};
use crate::core::types::ClassIndex;
use crate::core::utils::random::Random;
use crate::core::utils::threading::TaskBatch;
use crate::dataset::adapter::DataAdapter;
use crate::dataset::descriptor::DatasetDescriptor;
use crate::dataset::histogram::{ChunkHistograms, HistogramBuilder};
use crate::dataset::inhale::TrainingBufferBuilder;
use crate::dataset::minority::{select_chunks, CandidateChunk, ChunkSelection};
use crate::dataset::report::BuildReport;
use crate::dataset::stratify::StratificationPlan;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// Work the coordinator sends to a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeTask {
    /// Count classes of the node's home chunks.
    ClassHistogram {
        /// Dataset layout
        descriptor: DatasetDescriptor,
        /// Class column
        class_column: usize,
    },
    /// Build the node's training buffer.
    BuildBuffer {
        /// Dataset layout
        descriptor: DatasetDescriptor,
        /// Training configuration
        config: ForestConfig,
        /// Merged class counts of every chunk
        global: ChunkHistograms,
        /// Cluster-wide quotas; `None` takes all local rows
        plan: Option<StratificationPlan>,
        /// Trees this node grows
        trees: usize,
    },
}

/// A node's answer to a [`NodeTask`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskReply {
    /// Class counts of the node's home chunks
    Histogram(ChunkHistograms),
    /// Outcome of the buffer build
    Built(BuildReport),
}

/// Task handler of one node. Keeps the buffers it built for the tree grower.
#[derive(Debug)]
pub struct NodeService {
    node: NodeId,
    batch: TaskBatch,
    adapters: Mutex<HashMap<String, Arc<DataAdapter>>>,
}

impl NodeService {
    /// Creates the service of `node` running tasks on `batch`.
    pub fn new(node: NodeId, batch: TaskBatch) -> Self {
        NodeService {
            node,
            batch,
            adapters: Mutex::new(HashMap::new()),
        }
    }

    /// Node this service runs on
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Buffer built for `dataset`, if any.
    pub fn adapter(&self, dataset: &str) -> Option<Arc<DataAdapter>> {
        self.adapters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(dataset)
            .cloned()
    }

    /// Decodes a task, runs it against `store`, and encodes the reply.
    pub fn handle(&self, store: &dyn KeyValueStore, request: TaskEnvelope) -> Result<TaskEnvelope> {
        let reply = match request.decode::<NodeTask>()? {
            NodeTask::ClassHistogram {
                descriptor,
                class_column,
            } => TaskReply::Histogram(self.class_histogram(store, &descriptor, class_column)?),
            NodeTask::BuildBuffer {
                descriptor,
                config,
                global,
                plan,
                trees,
            } => {
                let mut report = self.build_buffer(store, &descriptor, &config, &global, plan)?;
                report.trees = trees;
                TaskReply::Built(report)
            }
        };
        TaskEnvelope::encode(&reply)
    }

    fn home_keys(&self, store: &dyn KeyValueStore, keys: &[ChunkKey]) -> Vec<ChunkKey> {
        keys.iter()
            .filter(|k| store.resolve_home(k) == self.node)
            .cloned()
            .collect()
    }

    /// Class counts of the chunks this node is home to.
    pub fn class_histogram(
        &self,
        store: &dyn KeyValueStore,
        descriptor: &DatasetDescriptor,
        class_column: usize,
    ) -> Result<ChunkHistograms> {
        let builder = HistogramBuilder::new(descriptor, class_column)?;
        let keys = self.home_keys(store, &descriptor.chunk_keys());
        builder.build_local(store, keys, &self.batch)
    }

    /// Builds and keeps this node's training buffer.
    pub fn build_buffer(
        &self,
        store: &dyn KeyValueStore,
        descriptor: &DatasetDescriptor,
        config: &ForestConfig,
        global: &ChunkHistograms,
        plan: Option<StratificationPlan>,
    ) -> Result<BuildReport> {
        let local = global.select(|k| store.resolve_home(k) == self.node);
        let local_counts = local.totals();

        let (plan, minority) = match plan {
            Some(plan) => {
                let minority =
                    self.select_minority(store, descriptor, config, global, &plan, &local_counts);
                (plan, minority)
            }
            None => (StratificationPlan::from_quotas(local_counts), Vec::new()),
        };

        let (adapter, mut report) = TrainingBufferBuilder::new(descriptor, config, store, &self.batch)
            .build(&local, &minority, &plan)?;
        report.node = Some(self.node);
        self.adapters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(descriptor.key.clone(), Arc::new(adapter));
        Ok(report)
    }

    fn select_minority(
        &self,
        store: &dyn KeyValueStore,
        descriptor: &DatasetDescriptor,
        config: &ForestConfig,
        global: &ChunkHistograms,
        plan: &StratificationPlan,
        local_counts: &[usize],
    ) -> Vec<ChunkSelection> {
        let under: Vec<ClassIndex> = plan.under_represented(local_counts);
        if under.is_empty() {
            return Vec::new();
        }
        log::info!(
            "{} is short of classes {:?}, selecting remote chunks",
            self.node,
            under
        );

        let homes: HashMap<&ChunkKey, NodeId> = global
            .keys()
            .iter()
            .map(|k| (k, store.resolve_home(k)))
            .collect();
        let mut rng = Random::for_node(config.seed, self.node.index());
        under
            .into_iter()
            .map(|class| {
                let mut home = Vec::new();
                let mut remote = Vec::new();
                for (key, c, rows) in global.nonzero() {
                    if c != class {
                        continue;
                    }
                    let candidate = CandidateChunk {
                        key: key.clone(),
                        rows,
                    };
                    if homes.get(key) == Some(&self.node) {
                        home.push(candidate);
                    } else {
                        remote.push(candidate);
                    }
                }
                select_chunks(
                    class,
                    plan.quotas[class],
                    descriptor.rows_per_chunk,
                    &home,
                    &remote,
                    &mut rng,
                    |key| store.get(key),
                )
            })
            .collect()
    }
}

/// Registers a [`NodeService`] for every node of `cluster` and returns them
/// in node order.
pub fn register_services(
    cluster: &Arc<InMemoryCluster>,
    num_threads: usize,
) -> Result<Vec<Arc<NodeService>>> {
    let batch = TaskBatch::new(num_threads)?;
    let mut services = Vec::with_capacity(cluster.num_nodes() as usize);
    for node in cluster.nodes() {
        let service = Arc::new(NodeService::new(node, batch.clone()));
        let weak: Weak<InMemoryCluster> = Arc::downgrade(cluster);
        let handler_service = Arc::clone(&service);
        cluster.register(
            node,
            Arc::new(move |request: TaskEnvelope| {
                let cluster = weak
                    .upgrade()
                    .ok_or_else(|| DrfError::remote(node.index(), "cluster has shut down"))?;
                handler_service.handle(cluster.as_ref(), request)
            }),
        );
        services.push(service);
    }
    Ok(services)
}
