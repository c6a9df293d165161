//! Scheduler — the per-tick placement loop and its call surface.
//!
//! The reconciliation driver calls into the scheduler once per tick, in
//! this order:
//!
//! 1. report ground truth (`register_node`, `add_running_replica`)
//! 2. garbage-collect (`prune_nodes`, `prune_jobs`)
//! 3. admit work (`add_job_to_queue`)
//! 4. `schedule()`, which also advances the tick
//!
//! Everything is synchronous and takes `&mut self`. A caller sharing one
//! scheduler between tasks wraps it in its own lock.

use tracing::{debug, error, info, trace, warn};

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::fit;
use crate::nodes::{Node, NodeIdx, NodeRegistry, Registration};
use crate::queue::{JobQueue, QueueEntry};
use crate::replicas::{ReplicaEntry, ReplicaTable};
use crate::staleness::Heartbeat;
use crate::types::{AllocatedReplica, JobId, Rank, Resources, Tick};

/// Gang scheduler over a fixed-size fleet.
///
/// `P` is caller-owned context attached to each job (for example an
/// `Arc` to the real workload descriptor). The scheduler keeps a clone
/// for as long as the job is queued or has tracked replicas and drops it
/// when the entry goes away.
pub struct Scheduler<P> {
    pub(crate) config: SchedulerConfig,
    pub(crate) tick: Tick,
    pub(crate) nodes: NodeRegistry,
    pub(crate) queue: JobQueue<P>,
    pub(crate) replicas: ReplicaTable<P>,
    /// Scratch buffers reused by every `schedule()` call.
    candidates: Vec<NodeIdx>,
    seated: Vec<NodeIdx>,
}

impl<P: Clone> Scheduler<P> {
    pub fn new(config: SchedulerConfig) -> SchedulerResult<Self> {
        config.validate()?;
        info!(
            max_nodes = config.max_nodes,
            max_queued_jobs = config.max_queued_jobs,
            max_replicas = config.max_replicas,
            max_candidates = config.max_candidates,
            "scheduler initialized"
        );
        Ok(Self::with_tables(config))
    }

    pub fn with_defaults() -> Self {
        Self::with_tables(SchedulerConfig::default())
    }

    fn with_tables(config: SchedulerConfig) -> Self {
        Self {
            tick: Tick::default(),
            nodes: NodeRegistry::with_limit(config.max_nodes),
            queue: JobQueue::with_limit(config.max_queued_jobs),
            replicas: ReplicaTable::with_limit(config.max_replicas),
            candidates: Vec::with_capacity(config.max_candidates),
            seated: Vec::with_capacity(config.max_candidates),
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    // ── Nodes ─────────────────────────────────────────────────────

    /// Register a node, or refresh its heartbeat if already known.
    ///
    /// The type and capacity of a known node are neither updated nor
    /// validated from here.
    pub fn register_node(
        &mut self,
        name: &str,
        node_type: &str,
        capacity: Resources,
    ) -> SchedulerResult<()> {
        if self.nodes.lookup(name).is_none() && capacity.is_negative() {
            return Err(SchedulerError::InvalidRequest(format!(
                "node {name} registered with negative capacity ({capacity})"
            )));
        }

        match self.nodes.register(name, node_type, capacity, self.tick) {
            Ok(Registration::Inserted(_)) => {
                debug!(node = name, node_type, %capacity, "node registered");
                Ok(())
            }
            Ok(Registration::Refreshed(_)) => {
                trace!(node = name, tick = %self.tick, "node heartbeat");
                Ok(())
            }
            Err(err) => {
                warn!(node = name, node_type, %capacity, error = %err, "cannot register node");
                Err(err)
            }
        }
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.lookup(name).and_then(|idx| self.nodes.get(idx))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().map(|(_, node)| node)
    }

    // ── Queue ─────────────────────────────────────────────────────

    /// Admit a gang request.
    ///
    /// Duplicate ids are not detected; use [`Self::is_job_in_queue`] first
    /// if that matters to the caller.
    pub fn add_job_to_queue(
        &mut self,
        job_id: JobId,
        job_type: &str,
        request: Resources,
        replicas: u32,
        payload: P,
    ) -> SchedulerResult<()> {
        if replicas == 0 {
            return Err(SchedulerError::InvalidRequest(format!(
                "job {job_id} requests zero replicas"
            )));
        }
        if request.is_negative() {
            return Err(SchedulerError::InvalidRequest(format!(
                "job {job_id} requests negative resources ({request})"
            )));
        }
        if replicas as usize > self.config.max_candidates {
            warn!(
                job_id,
                replicas,
                max_candidates = self.config.max_candidates,
                "gang is larger than the candidate bound and will stay queued"
            );
        }

        self.queue
            .push(QueueEntry {
                job_id,
                job_type: job_type.to_string(),
                request,
                replicas,
                last_seen: self.tick,
                payload,
            })
            .inspect_err(|err| warn!(job_id, error = %err, "cannot admit job"))?;

        debug!(job_id, job_type, replicas, %request, "job queued");
        Ok(())
    }

    pub fn is_job_in_queue(&self, job_id: JobId) -> bool {
        self.queue.position(job_id).is_some()
    }

    /// Tick the job was admitted in, if it is still queued.
    pub fn queued_since(&self, job_id: JobId) -> Option<Tick> {
        self.queue
            .position(job_id)
            .and_then(|idx| self.queue.get(idx))
            .map(|entry| entry.last_seen)
    }

    pub fn remove_job_from_queue(&mut self, job_id: JobId) {
        if self.queue.remove(job_id).is_some() {
            debug!(job_id, "job removed from queue");
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_jobs(&self) -> impl Iterator<Item = &QueueEntry<P>> {
        self.queue.iter()
    }

    // ── Replicas ──────────────────────────────────────────────────

    /// Report a replica observed running on `node`.
    ///
    /// A known (job, rank) only gets its heartbeat refreshed. A new one is
    /// recorded and its consumption is taken from the node without any
    /// feasibility check: reported state is ground truth. Negative
    /// consumption, or consumption that would take the residual out of the
    /// `i64` range, is rejected and nothing changes.
    pub fn add_running_replica(
        &mut self,
        job_id: JobId,
        rank: Rank,
        consumption: Resources,
        node: &str,
        payload: P,
    ) -> SchedulerResult<()> {
        if let Some(idx) = self.replicas.find(job_id, rank) {
            if let Some(entry) = self.replicas.get_mut(idx) {
                entry.touch(self.tick);
            }
            return Ok(());
        }

        if consumption.is_negative() {
            return Err(SchedulerError::InvalidRequest(format!(
                "replica {job_id}/{rank} reported with negative consumption ({consumption})"
            )));
        }

        let node_idx = self.nodes.lookup(node).ok_or_else(|| {
            warn!(job_id, rank, node, "replica reported on unknown node");
            SchedulerError::UnknownNode(node.to_string())
        })?;

        let residual = self
            .nodes
            .get(node_idx)
            .and_then(|n| n.residual().checked_sub(&consumption))
            .ok_or_else(|| {
                warn!(job_id, rank, node, %consumption, "replica consumption overflows node residual");
                SchedulerError::InvalidRequest(format!(
                    "replica {job_id}/{rank} consumption ({consumption}) overflows residual of node {node}"
                ))
            })?;

        self.replicas
            .insert(ReplicaEntry {
                job_id,
                rank,
                consumption,
                node: node_idx,
                last_seen: self.tick,
                payload,
            })
            .inspect_err(|err| warn!(job_id, rank, error = %err, "cannot track replica"))?;

        if let Some(node_entry) = self.nodes.get_mut(node_idx) {
            *node_entry.residual_mut() = residual;
            if residual.is_negative() {
                warn!(
                    node,
                    residual = %node_entry.residual(),
                    "reported replicas overcommit node"
                );
            }
        }

        debug!(job_id, rank, node, %consumption, "running replica recorded");
        Ok(())
    }

    /// Look up a tracked replica. With `touch`, also marks it as reported
    /// in the current tick.
    pub fn find_running_replica(
        &mut self,
        job_id: JobId,
        rank: Rank,
        touch: bool,
    ) -> Option<AllocatedReplica<P>> {
        let idx = self.replicas.find(job_id, rank)?;
        if touch {
            if let Some(entry) = self.replicas.get_mut(idx) {
                entry.touch(self.tick);
            }
        }
        self.allocated(idx)
    }

    /// All tracked replicas, in slot order.
    ///
    /// The iterator borrows the scheduler, so it cannot outlive the next
    /// mutating call.
    pub fn running_replicas(&self) -> impl Iterator<Item = AllocatedReplica<P>> + '_ {
        self.replicas.iter().filter_map(|(_, entry)| {
            self.nodes.get(entry.node).map(|node| AllocatedReplica {
                job_id: entry.job_id,
                rank: entry.rank,
                node: node.name().to_string(),
                payload: entry.payload.clone(),
            })
        })
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// Drop every replica of `job_id`, returning their capacity, and cancel
    /// the job if it is still queued. Returns the removed replicas.
    pub fn remove_job(&mut self, job_id: JobId) -> Vec<AllocatedReplica<P>> {
        let removed: Vec<_> = self
            .replicas
            .of_job(job_id)
            .into_iter()
            .filter_map(|idx| self.release_replica(idx))
            .collect();

        self.remove_job_from_queue(job_id);

        if !removed.is_empty() {
            debug!(job_id, replicas = removed.len(), "job removed");
        }
        removed
    }

    /// Remove a replica and hand its consumption back to its node.
    pub(crate) fn release_replica(&mut self, idx: usize) -> Option<AllocatedReplica<P>> {
        let allocated = self.allocated(idx);
        let entry = self.replicas.remove(idx)?;
        if let Some(node) = self.nodes.get_mut(entry.node) {
            // Tracked consumption is non-negative and already counted, so
            // the sum never exceeds capacity.
            match node.residual().checked_add(&entry.consumption) {
                Some(residual) => *node.residual_mut() = residual,
                None => error!(
                    job_id = entry.job_id,
                    rank = entry.rank,
                    node = node.name(),
                    "released consumption overflows node residual"
                ),
            }
        }
        allocated
    }

    fn allocated(&self, idx: usize) -> Option<AllocatedReplica<P>> {
        let entry = self.replicas.get(idx)?;
        let node = self.nodes.get(entry.node)?;
        Some(AllocatedReplica {
            job_id: entry.job_id,
            rank: entry.rank,
            node: node.name().to_string(),
            payload: entry.payload.clone(),
        })
    }

    // ── Scheduling ────────────────────────────────────────────────

    /// Run one scheduling pass over the queue and advance the tick.
    ///
    /// Each queued gang is placed whole, one replica per node, or left in
    /// the queue untouched. Returns the replicas placed in this pass; the
    /// driver must start them and report them back on later ticks or they
    /// are pruned.
    pub fn schedule(&mut self) -> Vec<AllocatedReplica<P>> {
        let mut placed = Vec::new();
        let mut candidates = std::mem::take(&mut self.candidates);
        let mut seated = std::mem::take(&mut self.seated);
        let mut gangs_placed = 0usize;
        let mut unvisited = self.queue.len();

        for queue_idx in 0..self.queue.limit() {
            if unvisited == 0 {
                break;
            }
            let Some(entry) = self.queue.get(queue_idx) else {
                continue;
            };
            unvisited -= 1;
            let job_id = entry.job_id;
            let request = entry.request;
            let gang = entry.replicas as usize;

            fit::collect_candidates(
                &self.nodes,
                &entry.job_type,
                &request,
                self.config.max_candidates,
                &mut candidates,
            );
            if candidates.len() < gang {
                debug!(
                    job_id,
                    gang,
                    candidates = candidates.len(),
                    "not enough candidate nodes, job stays queued"
                );
                continue;
            }

            fit::sort_best_fit(&self.nodes, &mut candidates);

            seated.clear();
            for &node_idx in &candidates {
                if seated.len() == gang {
                    break;
                }
                let Some(node) = self.nodes.get_mut(node_idx) else {
                    continue;
                };
                if fit::satisfies(node, &entry.job_type, &request) {
                    node.residual_mut().subtract(&request);
                    seated.push(node_idx);
                }
            }

            let ranks_taken =
                (0..entry.replicas).any(|rank| self.replicas.find(job_id, rank).is_some());
            if ranks_taken {
                warn!(job_id, "queued job already has tracked replicas, not placing");
            }

            if seated.len() < gang || ranks_taken || self.replicas.free_slots() < gang {
                for &node_idx in &seated {
                    if let Some(node) = self.nodes.get_mut(node_idx) {
                        node.residual_mut().add(&request);
                    }
                }
                if seated.len() == gang && !ranks_taken {
                    warn!(
                        job_id,
                        gang,
                        free = self.replicas.free_slots(),
                        "replica table too full for gang, job stays queued"
                    );
                }
                continue;
            }

            let Some(entry) = self.queue.take(queue_idx) else {
                continue;
            };
            for (rank, &node_idx) in seated.iter().enumerate() {
                let rank = rank as Rank;
                let inserted = self.replicas.insert(ReplicaEntry {
                    job_id,
                    rank,
                    consumption: request,
                    node: node_idx,
                    last_seen: self.tick,
                    payload: entry.payload.clone(),
                });
                if let Err(err) = inserted {
                    error!(job_id, rank, error = %err, "replica table rejected a checked gang");
                    continue;
                }

                let node = self
                    .nodes
                    .get(node_idx)
                    .map(|n| n.name().to_string())
                    .unwrap_or_default();
                debug!(job_id, rank, node = %node, "replica placed");
                placed.push(AllocatedReplica {
                    job_id,
                    rank,
                    node,
                    payload: entry.payload.clone(),
                });
            }
            gangs_placed += 1;
        }

        self.candidates = candidates;
        self.seated = seated;

        if gangs_placed > 0 {
            info!(
                tick = %self.tick,
                gangs = gangs_placed,
                replicas = placed.len(),
                queued = self.queue.len(),
                "scheduling pass placed work"
            );
        }
        self.tick = self.tick.next();
        placed
    }
}
