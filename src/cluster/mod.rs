//! Cluster collaborators consumed by the data-distribution engine.
//!
//! The engine never talks to sockets. It sees the cluster through two
//! contracts: a [`KeyValueStore`] that holds chunk payloads and knows each
//! chunk's home node, and a [`RemoteDispatch`] that runs a serializable task
//! on another node and blocks for the reply. [`InMemoryCluster`] implements
//! both for single-process runs and tests.

pub mod memory;
pub mod task;

pub use memory::InMemoryCluster;
pub use task::{dispatch, TaskEnvelope, Transfer};

use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Index of a node in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u16);

impl NodeId {
    /// Numeric index of the node
    pub fn index(self) -> u16 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

/// Address of one chunk: the dataset key plus the chunk's byte offset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    /// Key of the dataset the chunk belongs to
    pub dataset: String,
    /// Byte offset of the chunk's first row in the dataset
    pub offset: u64,
}

impl ChunkKey {
    /// Creates a chunk address
    pub fn new<S: Into<String>>(dataset: S, offset: u64) -> Self {
        ChunkKey {
            dataset: dataset.into(),
            offset,
        }
    }

    /// Ordinal of the chunk within its dataset.
    pub fn chunk_index(&self, chunk_bytes: usize) -> usize {
        (self.offset / chunk_bytes as u64) as usize
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.dataset, self.offset)
    }
}

/// Immutable chunk payload shared between tasks.
pub type ChunkBytes = Arc<[u8]>;

/// Cluster-wide key-value store holding chunk payloads.
pub trait KeyValueStore: Send + Sync {
    /// Fetches a chunk, locally or from its home node. `None` if absent.
    fn get(&self, key: &ChunkKey) -> Option<ChunkBytes>;

    /// Stores a chunk.
    fn put(&self, key: ChunkKey, value: ChunkBytes);

    /// Node owning the chunk.
    fn resolve_home(&self, key: &ChunkKey) -> NodeId;

    /// Blocks until all prior writes are visible cluster-wide.
    fn write_barrier(&self) {}
}

/// Runs tasks on other nodes.
pub trait RemoteDispatch: Send + Sync {
    /// Sends `request` to `target`, blocks, and returns the reply.
    /// Failures come back as [`crate::DrfError::Remote`] and are retryable.
    fn call(&self, target: NodeId, request: TaskEnvelope) -> Result<TaskEnvelope>;
}
