//! Heartbeat-based garbage collection.
//!
//! The driver re-reports every node and replica it can observe once per
//! tick. Reporting marks an entity with the current tick; pruning sweeps
//! everything not marked in the current generation. This stands in for
//! explicit removal callbacks from the system of record.

use tracing::{debug, info};

use crate::scheduler::Scheduler;
use crate::types::{AllocatedReplica, Tick};

/// An entity that is kept alive by being reported every tick.
pub trait Heartbeat {
    fn last_seen(&self) -> Tick;

    fn touch(&mut self, now: Tick);

    /// Not reported in the generation `now`.
    fn is_stale(&self, now: Tick) -> bool {
        self.last_seen() != now
    }
}

impl<P: Clone> Scheduler<P> {
    /// Evict every node not registered during the current tick.
    ///
    /// Replicas placed on an evicted node are dropped with it. Their
    /// consumption is not returned anywhere since the node is gone.
    /// Returns the names of the evicted nodes.
    pub fn prune_nodes(&mut self) -> Vec<String> {
        let now = self.tick;
        let stale = self.nodes.stale(now);
        let mut evicted = Vec::with_capacity(stale.len());

        for node_idx in stale {
            let orphans = self.replicas.on_node(node_idx);
            for replica_idx in &orphans {
                self.replicas.remove(*replica_idx);
            }
            if let Some(node) = self.nodes.remove(node_idx) {
                debug!(
                    node = %node.name(),
                    last_seen = %node.last_seen(),
                    orphaned_replicas = orphans.len(),
                    "node evicted"
                );
                evicted.push(node.into_name());
            }
        }

        if !evicted.is_empty() {
            info!(tick = %now, count = evicted.len(), "pruned stale nodes");
        }
        evicted
    }

    /// Evict every replica not reported during the current tick and return
    /// its consumption to its node.
    pub fn prune_jobs(&mut self) -> Vec<AllocatedReplica<P>> {
        let now = self.tick;
        let stale = self.replicas.stale(now);
        let mut pruned = Vec::with_capacity(stale.len());

        for replica_idx in stale {
            if let Some(replica) = self.release_replica(replica_idx) {
                pruned.push(replica);
            }
        }

        if !pruned.is_empty() {
            info!(tick = %now, count = pruned.len(), "pruned stale replicas");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use crate::scheduler::Scheduler;
    use crate::types::Resources;

    fn gpu_node() -> Resources {
        Resources::new(8000, 8000, 8)
    }

    #[test]
    fn prune_nodes_keeps_refreshed_nodes() {
        let mut sched: Scheduler<()> = Scheduler::with_defaults();
        sched.register_node("n1", "gpu", gpu_node()).unwrap();
        sched.register_node("n2", "gpu", gpu_node()).unwrap();
        sched.schedule();

        sched.register_node("n1", "gpu", gpu_node()).unwrap();
        let evicted = sched.prune_nodes();

        assert_eq!(evicted, vec!["n2".to_string()]);
        assert!(sched.node("n1").is_some());
        assert!(sched.node("n2").is_none());
        assert_eq!(sched.node_count(), 1);
    }

    #[test]
    fn prune_nodes_in_same_tick_is_noop() {
        let mut sched: Scheduler<()> = Scheduler::with_defaults();
        sched.register_node("n1", "gpu", gpu_node()).unwrap();
        assert!(sched.prune_nodes().is_empty());
        assert_eq!(sched.node_count(), 1);
    }

    #[test]
    fn evicted_node_slot_is_reusable() {
        let config = crate::SchedulerConfig {
            max_nodes: 1,
            ..Default::default()
        };
        let mut sched: Scheduler<()> = Scheduler::new(config).unwrap();
        sched.register_node("n1", "gpu", gpu_node()).unwrap();
        sched.schedule();
        assert_eq!(sched.prune_nodes(), vec!["n1".to_string()]);

        sched.register_node("n2", "gpu", gpu_node()).unwrap();
        assert!(sched.node("n2").is_some());
    }

    #[test]
    fn prune_jobs_returns_capacity() {
        let mut sched: Scheduler<&str> = Scheduler::with_defaults();
        sched.register_node("n1", "gpu", gpu_node()).unwrap();
        sched
            .add_running_replica(7, 0, gpu_node(), "n1", "payload")
            .unwrap();
        assert_eq!(sched.node("n1").unwrap().residual(), Resources::ZERO);
        sched.schedule();

        sched.register_node("n1", "gpu", gpu_node()).unwrap();
        let pruned = sched.prune_jobs();

        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].job_id, 7);
        assert_eq!(pruned[0].node, "n1");
        assert_eq!(pruned[0].payload, "payload");
        assert_eq!(sched.node("n1").unwrap().residual(), gpu_node());
        assert_eq!(sched.replica_count(), 0);
    }

    #[test]
    fn touched_replica_survives_prune() {
        let mut sched: Scheduler<()> = Scheduler::with_defaults();
        sched.register_node("n1", "gpu", gpu_node()).unwrap();
        sched
            .add_running_replica(1, 0, Resources::new(1000, 1000, 1), "n1", ())
            .unwrap();
        sched.schedule();

        assert!(sched.find_running_replica(1, 0, true).is_some());
        assert!(sched.prune_jobs().is_empty());
        assert_eq!(sched.replica_count(), 1);
    }
}
