//! Serializable dump of scheduler state for diagnostics.
//!
//! Payloads are caller-owned and left out.

use serde::{Deserialize, Serialize};

use crate::scheduler::Scheduler;
use crate::staleness::Heartbeat;
use crate::types::{JobId, Rank, Resources, Tick};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub tick: Tick,
    pub nodes: Vec<NodeSnapshot>,
    pub replicas: Vec<ReplicaSnapshot>,
    pub queue: Vec<QueuedJobSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub node_type: String,
    pub capacity: Resources,
    pub residual: Resources,
    pub last_seen: Tick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaSnapshot {
    pub job_id: JobId,
    pub rank: Rank,
    pub node: String,
    pub consumption: Resources,
    pub last_seen: Tick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJobSnapshot {
    pub job_id: JobId,
    pub job_type: String,
    pub request: Resources,
    pub replicas: u32,
    pub last_seen: Tick,
}

impl<P: Clone> Scheduler<P> {
    pub fn snapshot(&self) -> SchedulerSnapshot {
        let nodes = self
            .nodes
            .iter()
            .map(|(_, node)| NodeSnapshot {
                name: node.name().to_string(),
                node_type: node.node_type().to_string(),
                capacity: node.capacity(),
                residual: node.residual(),
                last_seen: node.last_seen(),
            })
            .collect();

        let replicas = self
            .replicas
            .iter()
            .filter_map(|(_, entry)| {
                let node = self.nodes.get(entry.node)?;
                Some(ReplicaSnapshot {
                    job_id: entry.job_id,
                    rank: entry.rank,
                    node: node.name().to_string(),
                    consumption: entry.consumption,
                    last_seen: entry.last_seen,
                })
            })
            .collect();

        let queue = self
            .queue
            .iter()
            .map(|entry| QueuedJobSnapshot {
                job_id: entry.job_id,
                job_type: entry.job_type.clone(),
                request: entry.request,
                replicas: entry.replicas,
                last_seen: entry.last_seen,
            })
            .collect();

        SchedulerSnapshot {
            tick: self.tick,
            nodes,
            replicas,
            queue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_lists_everything() {
        let mut sched: Scheduler<()> = Scheduler::with_defaults();
        sched
            .register_node("N1", "gpu", Resources::new(8000, 8000, 8))
            .unwrap();
        sched
            .add_job_to_queue(1, "gpu", Resources::new(1000, 1000, 1), 1, ())
            .unwrap();
        sched
            .add_job_to_queue(2, "gpu", Resources::new(1000, 1000, 1), 9, ())
            .unwrap();
        sched.schedule();

        let snap = sched.snapshot();
        assert_eq!(snap.tick, Tick(1));
        assert_eq!(snap.nodes.len(), 1);
        assert_eq!(snap.nodes[0].residual, Resources::new(7000, 7000, 7));
        assert_eq!(snap.replicas.len(), 1);
        assert_eq!(snap.replicas[0].node, "N1");
        assert_eq!(snap.queue.len(), 1);
        assert_eq!(snap.queue[0].job_id, 2);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let mut sched: Scheduler<()> = Scheduler::with_defaults();
        sched
            .register_node("N1", "gpu", Resources::new(8000, 8000, 8))
            .unwrap();

        let json = serde_json::to_value(sched.snapshot()).unwrap();
        assert_eq!(json["tick"], 0);
        assert_eq!(json["nodes"][0]["name"], "N1");
        assert_eq!(json["nodes"][0]["capacity"]["gpus"], 8);

        let back: SchedulerSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, sched.snapshot());
    }
}
