//! Node registry — known nodes and their residual capacity.
//!
//! Nodes live in a fixed number of slots. A name index gives O(1) lookup
//! and a free list gives O(1) slot allocation. Slot order is the scan
//! order used by the scheduler's candidate search.

use std::collections::HashMap;

use crate::error::{SchedulerError, SchedulerResult, Table};
use crate::staleness::Heartbeat;
use crate::types::{Resources, Tick};

/// Index of a node slot. Replicas refer to their node by slot.
pub(crate) type NodeIdx = usize;

/// A registered worker node.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    node_type: String,
    capacity: Resources,
    residual: Resources,
    last_seen: Tick,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque compatibility tag, matched exactly against job types.
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    /// Capacity as first registered.
    pub fn capacity(&self) -> Resources {
        self.capacity
    }

    /// Capacity not consumed by tracked replicas.
    pub fn residual(&self) -> Resources {
        self.residual
    }

    pub(crate) fn residual_mut(&mut self) -> &mut Resources {
        &mut self.residual
    }

    pub(crate) fn into_name(self) -> String {
        self.name
    }
}

impl Heartbeat for Node {
    fn last_seen(&self) -> Tick {
        self.last_seen
    }

    fn touch(&mut self, now: Tick) {
        self.last_seen = now;
    }
}

/// Result of [`NodeRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Registration {
    Refreshed(NodeIdx),
    Inserted(NodeIdx),
}

pub(crate) struct NodeRegistry {
    slots: Vec<Option<Node>>,
    by_name: HashMap<String, NodeIdx>,
    free: Vec<NodeIdx>,
}

impl NodeRegistry {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            slots: (0..limit).map(|_| None).collect(),
            by_name: HashMap::with_capacity(limit),
            // Popped from the back, so low slots are handed out first.
            free: (0..limit).rev().collect(),
        }
    }

    pub fn limit(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn lookup(&self, name: &str) -> Option<NodeIdx> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, idx: NodeIdx) -> Option<&Node> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, idx: NodeIdx) -> Option<&mut Node> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    /// Insert a node, or refresh the heartbeat of an existing one.
    ///
    /// Capacity is fixed at first registration. A resized node has to be
    /// pruned and registered again.
    pub fn register(
        &mut self,
        name: &str,
        node_type: &str,
        capacity: Resources,
        now: Tick,
    ) -> SchedulerResult<Registration> {
        if let Some(idx) = self.lookup(name) {
            if let Some(node) = self.get_mut(idx) {
                node.touch(now);
            }
            return Ok(Registration::Refreshed(idx));
        }

        let idx = self.free.pop().ok_or(SchedulerError::CapacityExceeded {
            table: Table::Nodes,
            limit: self.limit(),
        })?;

        self.slots[idx] = Some(Node {
            name: name.to_string(),
            node_type: node_type.to_string(),
            capacity,
            residual: capacity,
            last_seen: now,
        });
        self.by_name.insert(name.to_string(), idx);
        Ok(Registration::Inserted(idx))
    }

    pub fn remove(&mut self, idx: NodeIdx) -> Option<Node> {
        let node = self.slots.get_mut(idx)?.take()?;
        self.by_name.remove(node.name());
        self.free.push(idx);
        Some(node)
    }

    /// Occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIdx, &Node)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|node| (idx, node)))
    }

    pub fn stale(&self, now: Tick) -> Vec<NodeIdx> {
        self.iter()
            .filter(|(_, node)| node.is_stale(now))
            .map(|(idx, _)| idx)
            .collect()
    }
}
