//! Timed reconciliation loop against simulated infrastructure.
//!
//! The simulated side starts whatever the scheduler places, lets replicas
//! finish at random and occasionally takes nodes down. The driver follows
//! the per-tick order the scheduler expects and checks capacity accounting
//! after every pass.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use gridpack_scheduler::{
    AllocatedReplica, JobId, Rank, Resources, Scheduler, SchedulerConfig, SchedulerError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

const GIB: i64 = 1024 * 1024 * 1024;

const FINISH_PROBABILITY: f64 = 0.05;
const NODE_DOWN_PROBABILITY: f64 = 0.01;
const NODE_RECOVER_PROBABILITY: f64 = 0.2;
const MAX_ARRIVALS_PER_TICK: u32 = 4;
/// Jobs queued for longer than this are cancelled by the driver.
const STARVATION_TICKS: u64 = 200;

/// Caller-owned workload descriptor, shared with the scheduler as payload.
#[derive(Debug)]
struct Workload {
    job_type: &'static str,
    request: Resources,
}

struct SimNode {
    name: String,
    node_type: &'static str,
    capacity: Resources,
    up: bool,
}

struct Infrastructure {
    nodes: Vec<SimNode>,
    running: HashMap<(JobId, Rank), (String, Arc<Workload>)>,
    rng: StdRng,
}

impl Infrastructure {
    fn new(nodes: usize, seed: u64) -> Self {
        let nodes = (0..nodes)
            .map(|i| {
                let (node_type, capacity) = if i % 2 == 0 {
                    ("gpu", Resources::new(32_000, 256 * GIB, 8))
                } else {
                    ("cpu", Resources::new(64_000, 128 * GIB, 0))
                };
                SimNode {
                    name: format!("{node_type}-{i:03}"),
                    node_type,
                    capacity,
                    up: true,
                }
            })
            .collect();
        Self {
            nodes,
            running: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Advance the simulated world by one tick. Returns (finished, lost).
    fn churn(&mut self) -> (usize, usize) {
        let rng = &mut self.rng;
        let before = self.running.len();
        self.running.retain(|_, _| !rng.random_bool(FINISH_PROBABILITY));
        let finished = before - self.running.len();

        for node in &mut self.nodes {
            let flip = if node.up {
                NODE_DOWN_PROBABILITY
            } else {
                NODE_RECOVER_PROBABILITY
            };
            if rng.random_bool(flip) {
                node.up = !node.up;
                debug!(node = %node.name, up = node.up, "simulated node flapped");
            }
        }

        let up: HashSet<&str> = self
            .nodes
            .iter()
            .filter(|n| n.up)
            .map(|n| n.name.as_str())
            .collect();
        let before = self.running.len();
        self.running.retain(|_, (node, _)| up.contains(node.as_str()));
        (finished, before - self.running.len())
    }

    fn start(&mut self, replica: AllocatedReplica<Arc<Workload>>) {
        let node_up = self.nodes.iter().any(|n| n.up && n.name == replica.node);
        if node_up {
            self.running
                .insert((replica.job_id, replica.rank), (replica.node, replica.payload));
        }
    }
}

#[derive(Debug, Default)]
struct Totals {
    admitted: u64,
    backpressured: u64,
    placed: u64,
    finished: u64,
    lost: u64,
    pruned_replicas: u64,
    evicted_nodes: u64,
    starved: u64,
    drift: u64,
}

struct Driver {
    scheduler: Scheduler<Arc<Workload>>,
    infra: Infrastructure,
    next_job: JobId,
    totals: Totals,
}

impl Driver {
    fn tick(&mut self) -> anyhow::Result<()> {
        let (finished, lost) = self.infra.churn();
        self.totals.finished += finished as u64;
        self.totals.lost += lost as u64;

        // 1. Ground truth.
        for node in self.infra.nodes.iter().filter(|n| n.up) {
            self.scheduler
                .register_node(&node.name, node.node_type, node.capacity)?;
        }
        for ((job_id, rank), (node, workload)) in &self.infra.running {
            match self.scheduler.add_running_replica(
                *job_id,
                *rank,
                workload.request,
                node,
                workload.clone(),
            ) {
                Ok(()) => {}
                Err(SchedulerError::UnknownNode(name)) => {
                    warn!(job_id, rank, node = %name, "dropping replica report until node is registered");
                    self.totals.drift += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }

        // 2. Garbage collection.
        let evicted = self.scheduler.prune_nodes();
        self.totals.evicted_nodes += evicted.len() as u64;
        for replica in self.scheduler.prune_jobs() {
            self.infra.running.remove(&(replica.job_id, replica.rank));
            self.totals.pruned_replicas += 1;
        }

        // Age-based cancellation is the driver's job.
        let now = self.scheduler.current_tick();
        let starved: Vec<JobId> = self
            .scheduler
            .queued_jobs()
            .filter(|entry| now.since(entry.last_seen) > STARVATION_TICKS)
            .map(|entry| entry.job_id)
            .collect();
        for job_id in starved {
            warn!(job_id, "job starved in queue, cancelling");
            self.scheduler.remove_job(job_id);
            self.totals.starved += 1;
        }

        // 3. Admission.
        let arrivals = self.infra.rng.random_range(0..=MAX_ARRIVALS_PER_TICK);
        for _ in 0..arrivals {
            let workload = self.random_workload();
            let replicas = self.infra.rng.random_range(1..=3);
            let job_id = self.next_job;
            match self.scheduler.add_job_to_queue(
                job_id,
                workload.job_type,
                workload.request,
                replicas,
                workload,
            ) {
                Ok(()) => {
                    self.next_job += 1;
                    self.totals.admitted += 1;
                }
                Err(SchedulerError::CapacityExceeded { .. }) => {
                    self.totals.backpressured += 1;
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        // 4. Schedule and start what was placed.
        let placed = self.scheduler.schedule();
        self.totals.placed += placed.len() as u64;
        for replica in placed {
            self.infra.start(replica);
        }

        self.check_accounting()
    }

    fn random_workload(&mut self) -> Arc<Workload> {
        let rng = &mut self.infra.rng;
        let workload = if rng.random_bool(0.5) {
            Workload {
                job_type: "gpu",
                request: Resources::new(
                    rng.random_range(1..=8i64) * 1000,
                    rng.random_range(1..=32i64) * GIB,
                    rng.random_range(1..=4i64),
                ),
            }
        } else {
            Workload {
                job_type: "cpu",
                request: Resources::new(
                    rng.random_range(1..=16i64) * 1000,
                    rng.random_range(1..=32i64) * GIB,
                    0,
                ),
            }
        };
        Arc::new(workload)
    }

    /// Every node's residual must equal its capacity minus the requests of
    /// the replicas tracked on it.
    fn check_accounting(&self) -> anyhow::Result<()> {
        let mut used: HashMap<String, Resources> = HashMap::new();
        for replica in self.scheduler.running_replicas() {
            used.entry(replica.node)
                .or_default()
                .add(&replica.payload.request);
        }
        for node in self.scheduler.nodes() {
            let mut expected = node.capacity();
            if let Some(u) = used.get(node.name()) {
                expected.subtract(u);
            }
            anyhow::ensure!(
                node.residual() == expected,
                "accounting drift on {}: residual {} expected {}",
                node.name(),
                node.residual(),
                expected
            );
        }
        Ok(())
    }
}

pub async fn run(
    config: SchedulerConfig,
    ticks: u64,
    interval_ms: u64,
    nodes: usize,
    seed: u64,
    dump: bool,
) -> anyhow::Result<()> {
    let mut driver = Driver {
        scheduler: Scheduler::new(config)?,
        infra: Infrastructure::new(nodes, seed),
        next_job: 1,
        totals: Totals::default(),
    };

    info!(ticks, interval_ms, nodes, seed, "soak started");

    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    for _ in 0..ticks {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
        driver.tick()?;
        debug!(
            tick = %driver.scheduler.current_tick(),
            queued = driver.scheduler.queue_len(),
            running = driver.scheduler.replica_count(),
            "tick complete"
        );
    }

    println!(
        "soak: {} ticks, {:?}, {} still queued, {} replicas tracked",
        driver.scheduler.current_tick().0,
        driver.totals,
        driver.scheduler.queue_len(),
        driver.scheduler.replica_count()
    );
    if dump {
        super::dump(&driver.scheduler)?;
    }
    Ok(())
}
