//! Pending gang requests.
//!
//! A bounded pool of slots. Iteration follows slot order, which is not
//! strict submission order once slots start being reused.

use crate::error::{SchedulerError, SchedulerResult, Table};
use crate::types::{JobId, Resources, Tick};

/// A gang request waiting for placement.
#[derive(Debug, Clone)]
pub struct QueueEntry<P> {
    pub job_id: JobId,
    pub job_type: String,
    /// Requirement of a single replica.
    pub request: Resources,
    /// Gang size; all replicas are placed together or not at all.
    pub replicas: u32,
    /// Tick the entry was admitted in. Queue entries are never refreshed
    /// or pruned, so callers derive queue age from this.
    pub last_seen: Tick,
    pub payload: P,
}

pub(crate) struct JobQueue<P> {
    slots: Vec<Option<QueueEntry<P>>>,
    free: Vec<usize>,
}

impl<P> JobQueue<P> {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            slots: (0..limit).map(|_| None).collect(),
            free: (0..limit).rev().collect(),
        }
    }

    pub fn limit(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Store an entry. Duplicate job ids are not detected.
    pub fn push(&mut self, entry: QueueEntry<P>) -> SchedulerResult<usize> {
        let idx = self.free.pop().ok_or(SchedulerError::CapacityExceeded {
            table: Table::Queue,
            limit: self.limit(),
        })?;
        self.slots[idx] = Some(entry);
        Ok(idx)
    }

    pub fn get(&self, idx: usize) -> Option<&QueueEntry<P>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    pub fn take(&mut self, idx: usize) -> Option<QueueEntry<P>> {
        let entry = self.slots.get_mut(idx)?.take()?;
        self.free.push(idx);
        Some(entry)
    }

    pub fn position(&self, job_id: JobId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|e| e.job_id == job_id))
    }

    /// Remove the first entry for `job_id`, if any.
    pub fn remove(&mut self, job_id: JobId) -> Option<QueueEntry<P>> {
        let idx = self.position(job_id)?;
        self.take(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry<P>> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}
