//! # DRF Rust
//!
//! Data distribution and split search for a distributed random forest.
//!
//! A dataset lives in a cluster as fixed-width row chunks, each chunk homed
//! on one node. Before trees can be grown, every node needs a local
//! training buffer holding a stratified sample of the whole dataset. This
//! crate builds those buffers and provides the split statistic the tree
//! grower runs against them.
//!
//! ## Pipeline
//!
//! 1. Each node counts the classes of its home chunks
//!    ([`dataset::HistogramBuilder`]).
//! 2. The coordinator merges the counts and computes a per-class row quota
//!    for every node ([`dataset::Stratifier`]).
//! 3. Nodes short of some class fetch random remote chunks holding it
//!    ([`dataset::select_chunks`]).
//! 4. Each node decodes, filters and bins the selected rows into its
//!    [`dataset::DataAdapter`] ([`dataset::TrainingBufferBuilder`]).
//! 5. The tree grower scores candidate splits with a
//!    [`tree::SplitStatistic`] per tree node.
//!
//! [`forest::ForestJob`] runs steps 1 to 4 across a cluster.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drf_rust::{
//!     register_services, DatasetWriter, ForestConfigBuilder, ForestJob, InMemoryCluster, NodeId,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> drf_rust::Result<()> {
//! let mut writer = DatasetWriter::new("iris.hex", 64)
//!     .float_column("petal_length", -4)
//!     .int_column("species", 1);
//! writer.push_row(&[Some(1.4), Some(0.0)])?;
//! writer.push_row(&[Some(4.7), Some(1.0)])?;
//! let dataset = writer.finish()?;
//!
//! let cluster = Arc::new(InMemoryCluster::new(2));
//! dataset.distribute(&cluster, |chunk| NodeId((chunk % 2) as u16));
//! let services = register_services(&cluster, 0)?;
//!
//! let config = ForestConfigBuilder::new()
//!     .class_column(1)
//!     .stratify(true)
//!     .build()?;
//! let job = ForestJob::new(dataset.descriptor.clone(), config)?;
//! let report = job.run(cluster.as_ref(), cluster.as_ref())?;
//! println!("rows per node: {:?}", report.nodes.iter().map(|n| n.total_rows()).collect::<Vec<_>>());
//!
//! let buffer = services[0].adapter("iris.hex");
//! # let _ = buffer;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]

// Core infrastructure module - always available
pub mod core;

// Configuration management module
pub mod config;

// Cluster collaborators: chunk store and remote dispatch
pub mod cluster;

// Histograms, stratification and the training buffer
pub mod dataset;

// Split statistic
pub mod tree;

// Cluster-wide orchestration
pub mod forest;

pub use crate::core::{
    constants::*,
    error::{DrfError, Result},
    init_logging,
    types::*,
};

pub use config::{ForestConfig, ForestConfigBuilder, StratumOverride};

pub use cluster::{
    ChunkBytes, ChunkKey, InMemoryCluster, KeyValueStore, NodeId, RemoteDispatch, TaskEnvelope,
    Transfer,
};

pub use dataset::{
    BuildReport, BuildWarning, ChunkHistograms, ColumnCodec, ColumnDescriptor, DataAdapter,
    DatasetDescriptor, DatasetWriter, HistogramBuilder, StratificationPlan, Stratifier,
    TrainingBufferBuilder,
};

pub use tree::{ClassifiedRow, Split, SplitData, SplitStatistic};

pub use forest::{register_services, ForestJob, JobReport, NodeService};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
