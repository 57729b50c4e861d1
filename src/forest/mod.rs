//! Cluster-wide orchestration of a training buffer build.
//!
//! A [`ForestJob`] validates the input, gathers per-chunk class histograms
//! from every node that holds data, plans the stratification, and asks each
//! node's [`NodeService`] to build its training buffer.

pub mod job;
pub mod service;

pub use job::{ForestJob, JobReport};
pub use service::{register_services, NodeService, NodeTask, TaskReply};

use crate::cluster::{KeyValueStore, NodeId};
use crate::config::ForestConfig;
use crate::core::error::{DrfError, Result};
use crate::dataset::descriptor::DatasetDescriptor;
use std::collections::BTreeSet;

/// Checks that `descriptor` can be trained on with `config` and returns the
/// number of classes. Runs before any task is scheduled.
pub fn validate_input(descriptor: &DatasetDescriptor, config: &ForestConfig) -> Result<usize> {
    config.validate()?;
    descriptor.validate_layout()?;
    let num_classes = descriptor.num_classes(config.class_column)?;
    if let Some(&bad) = config
        .ignored_columns
        .iter()
        .find(|&&c| c >= descriptor.num_columns())
    {
        return Err(DrfError::index_out_of_bounds(bad, descriptor.num_columns()));
    }
    if !config.class_weights.is_empty() && config.class_weights.len() != num_classes {
        return Err(DrfError::invalid_parameter(
            "class_weights",
            format!("{} weights", config.class_weights.len()),
            format!("expected one weight per class ({})", num_classes),
        ));
    }
    Ok(num_classes)
}

/// Nodes that are home to at least one chunk of the dataset, by index.
pub fn participating_nodes(store: &dyn KeyValueStore, descriptor: &DatasetDescriptor) -> Vec<NodeId> {
    let homes: BTreeSet<NodeId> = descriptor
        .chunk_keys()
        .iter()
        .map(|k| store.resolve_home(k))
        .collect();
    homes.into_iter().collect()
}

/// Trees grown by the node at position `index` among `nodes` participants:
/// an even share, with the remainder going to the lowest positions.
pub fn trees_for_node(total: usize, nodes: usize, index: usize) -> usize {
    if nodes == 0 {
        return 0;
    }
    let per_node = total / nodes;
    per_node + usize::from(index < total - per_node * nodes)
}
