//! Per-node energy-saving state.
//!
//! Each node's [`EnergySaveState`] sits behind its own mutex. The map lock is
//! only held long enough to clone the node's handle, so updates to one node
//! never wait on another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use deepsleep_common::models::NodeId;

use crate::state::EnergySaveState;
use crate::stats::NodeSnapshot;

pub type NodeHandle = Arc<Mutex<EnergySaveState>>;

#[derive(Default)]
pub struct NodeRegistry {
    nodes: DashMap<NodeId, NodeHandle>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start monitoring `node` with a fresh state. Returns false if the node
    /// was already monitored, in which case its state is kept.
    pub fn insert(&self, node: NodeId) -> bool {
        let mut inserted = false;
        self.nodes.entry(node).or_insert_with(|| {
            inserted = true;
            Arc::new(Mutex::new(EnergySaveState::new()))
        });
        inserted
    }

    /// Stop monitoring `node`, returning its final state.
    pub fn remove(&self, node: &NodeId) -> Option<EnergySaveState> {
        let (_, handle) = self.nodes.remove(node)?;
        let state = lock(&handle).clone();
        Some(state)
    }

    pub fn get(&self, node: &NodeId) -> Option<NodeHandle> {
        self.nodes.get(node).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Snapshot every node under its own lock, sorted by node for stable
    /// report output.
    pub fn snapshots(&self, now_us: u64) -> Vec<NodeSnapshot> {
        let handles: Vec<(NodeId, NodeHandle)> = self
            .nodes
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        let mut out: Vec<NodeSnapshot> = handles
            .into_iter()
            .map(|(node, handle)| {
                let state = lock(&handle);
                NodeSnapshot::capture(node, &state, now_us)
            })
            .collect();
        out.sort_by_key(|s| (s.node.plmn.mcc, s.node.plmn.mnc, s.node.nb_id, s.node.cu_du_id));
        out
    }
}

/// Lock a node's state, recovering it if a previous holder panicked.
pub fn lock(handle: &NodeHandle) -> MutexGuard<'_, EnergySaveState> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}
