//! Single-process cluster used for local runs and tests.

use crate::cluster::{ChunkBytes, ChunkKey, KeyValueStore, NodeId, RemoteDispatch, TaskEnvelope, Transfer};
use crate::core::error::{DrfError, Result};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Handler executing an incoming task on one node.
pub type TaskHandler = Arc<dyn Fn(TaskEnvelope) -> Result<TaskEnvelope> + Send + Sync>;

/// All nodes of a cluster living in one process.
///
/// Chunk payloads live in one shared map; every chunk still has exactly one
/// home node. Remote calls go through the same bincode envelopes a networked
/// implementation would send.
pub struct InMemoryCluster {
    num_nodes: u16,
    chunks: RwLock<HashMap<ChunkKey, ChunkBytes>>,
    homes: RwLock<HashMap<ChunkKey, NodeId>>,
    handlers: RwLock<HashMap<NodeId, TaskHandler>>,
    datagrams: AtomicUsize,
    streams: AtomicUsize,
}

impl InMemoryCluster {
    /// Creates a cluster of `num_nodes` nodes.
    pub fn new(num_nodes: u16) -> Self {
        assert!(num_nodes > 0, "a cluster needs at least one node");
        InMemoryCluster {
            num_nodes,
            chunks: RwLock::new(HashMap::new()),
            homes: RwLock::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            datagrams: AtomicUsize::new(0),
            streams: AtomicUsize::new(0),
        }
    }

    /// Number of nodes
    pub fn num_nodes(&self) -> u16 {
        self.num_nodes
    }

    /// All node ids in index order
    pub fn nodes(&self) -> Vec<NodeId> {
        (0..self.num_nodes).map(NodeId).collect()
    }

    /// Stores a chunk with an explicit home node.
    pub fn put_on(&self, home: NodeId, key: ChunkKey, value: ChunkBytes) {
        self.write_homes().insert(key.clone(), home);
        self.write_chunks().insert(key, value);
    }

    /// Drops a chunk payload while keeping its home, as if the home node lost it.
    pub fn remove(&self, key: &ChunkKey) -> Option<ChunkBytes> {
        self.write_chunks().remove(key)
    }

    /// Registers the task handler of a node.
    pub fn register(&self, node: NodeId, handler: TaskHandler) {
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(node, handler);
    }

    /// Number of envelopes sent as datagrams and as streams so far.
    pub fn transfer_counts(&self) -> (usize, usize) {
        (
            self.datagrams.load(Ordering::Relaxed),
            self.streams.load(Ordering::Relaxed),
        )
    }

    fn default_home(&self, key: &ChunkKey) -> NodeId {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        NodeId((hasher.finish() % u64::from(self.num_nodes)) as u16)
    }

    fn count(&self, envelope: &TaskEnvelope) {
        match envelope.transfer() {
            Transfer::Datagram => self.datagrams.fetch_add(1, Ordering::Relaxed),
            Transfer::Stream => self.streams.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn write_chunks(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ChunkKey, ChunkBytes>> {
        self.chunks.write().unwrap_or_else(|e| e.into_inner())
    }

    fn write_homes(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ChunkKey, NodeId>> {
        self.homes.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for InMemoryCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chunks = self.chunks.read().map(|c| c.len()).unwrap_or(0);
        f.debug_struct("InMemoryCluster")
            .field("num_nodes", &self.num_nodes)
            .field("chunks", &chunks)
            .finish()
    }
}

impl KeyValueStore for InMemoryCluster {
    fn get(&self, key: &ChunkKey) -> Option<ChunkBytes> {
        self.chunks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn put(&self, key: ChunkKey, value: ChunkBytes) {
        let home = self.resolve_home(&key);
        self.put_on(home, key, value);
    }

    fn resolve_home(&self, key: &ChunkKey) -> NodeId {
        self.homes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
            .unwrap_or_else(|| self.default_home(key))
    }
}

impl RemoteDispatch for InMemoryCluster {
    fn call(&self, target: NodeId, request: TaskEnvelope) -> Result<TaskEnvelope> {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&target)
            .cloned()
            .ok_or_else(|| DrfError::remote(target.index(), "no task handler registered"))?;
        self.count(&request);
        let reply = handler(request).map_err(|e| match e {
            DrfError::Remote { .. } => e,
            other => DrfError::remote(target.index(), other.to_string()),
        })?;
        self.count(&reply);
        Ok(reply)
    }
}
