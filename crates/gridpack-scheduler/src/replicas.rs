//! Placed replicas and the node slot each one consumes capacity on.

use std::collections::HashMap;

use crate::error::{SchedulerError, SchedulerResult, Table};
use crate::nodes::NodeIdx;
use crate::staleness::Heartbeat;
use crate::types::{JobId, Rank, Resources, Tick};

/// One running (or about to run) replica of a gang.
#[derive(Debug, Clone)]
pub(crate) struct ReplicaEntry<P> {
    pub job_id: JobId,
    pub rank: Rank,
    pub consumption: Resources,
    /// Back-reference for lookup only; the registry owns the node.
    pub node: NodeIdx,
    pub last_seen: Tick,
    pub payload: P,
}

impl<P> Heartbeat for ReplicaEntry<P> {
    fn last_seen(&self) -> Tick {
        self.last_seen
    }

    fn touch(&mut self, now: Tick) {
        self.last_seen = now;
    }
}

pub(crate) struct ReplicaTable<P> {
    slots: Vec<Option<ReplicaEntry<P>>>,
    index: HashMap<(JobId, Rank), usize>,
    free: Vec<usize>,
}

impl<P> ReplicaTable<P> {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            slots: (0..limit).map(|_| None).collect(),
            index: HashMap::with_capacity(limit),
            free: (0..limit).rev().collect(),
        }
    }

    pub fn limit(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn free_slots(&self) -> usize {
        self.free.len()
    }

    pub fn find(&self, job_id: JobId, rank: Rank) -> Option<usize> {
        self.index.get(&(job_id, rank)).copied()
    }

    pub fn get(&self, idx: usize) -> Option<&ReplicaEntry<P>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut ReplicaEntry<P>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    /// Store a replica whose (job, rank) is not yet tracked.
    pub fn insert(&mut self, entry: ReplicaEntry<P>) -> SchedulerResult<usize> {
        let key = (entry.job_id, entry.rank);
        if self.index.contains_key(&key) {
            return Err(SchedulerError::InvalidRequest(format!(
                "replica {}[{}] already tracked",
                entry.job_id, entry.rank
            )));
        }
        let idx = self.free.pop().ok_or(SchedulerError::CapacityExceeded {
            table: Table::Replicas,
            limit: self.limit(),
        })?;
        self.slots[idx] = Some(entry);
        self.index.insert(key, idx);
        Ok(idx)
    }

    pub fn remove(&mut self, idx: usize) -> Option<ReplicaEntry<P>> {
        let entry = self.slots.get_mut(idx)?.take()?;
        self.index.remove(&(entry.job_id, entry.rank));
        self.free.push(idx);
        Some(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ReplicaEntry<P>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|entry| (idx, entry)))
    }

    pub fn of_job(&self, job_id: JobId) -> Vec<usize> {
        self.iter()
            .filter(|(_, e)| e.job_id == job_id)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn on_node(&self, node: NodeIdx) -> Vec<usize> {
        self.iter()
            .filter(|(_, e)| e.node == node)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn stale(&self, now: Tick) -> Vec<usize> {
        self.iter()
            .filter(|(_, e)| e.is_stale(now))
            .map(|(idx, _)| idx)
            .collect()
    }
}
