use std::time::Instant;

use gridpack_scheduler::{Resources, Scheduler, SchedulerConfig};
use tracing::info;

const GIB: i64 = 1024 * 1024 * 1024;

/// Register a large mixed-type fleet and push many small jobs through it.
/// Placements are never reported back, so capacity only drains.
pub fn run(
    config: SchedulerConfig,
    nodes: usize,
    types: usize,
    rounds: u64,
    jobs_per_round: u64,
    dump: bool,
) -> anyhow::Result<()> {
    anyhow::ensure!(types > 0, "--types must be at least 1");

    let offered = rounds * jobs_per_round;
    let config = SchedulerConfig {
        max_nodes: config.max_nodes.max(nodes),
        max_replicas: config.max_replicas.max(offered as usize),
        ..config
    };
    let mut scheduler: Scheduler<()> = Scheduler::new(config)?;

    for i in 0..nodes {
        scheduler.register_node(
            &format!("node-{i:04}"),
            &format!("type-{}", i % types),
            Resources::new(64_000, 64 * GIB, 0),
        )?;
    }
    info!(nodes, types, "fleet registered");

    let request = Resources::new(1000, GIB, 0);
    let start = Instant::now();
    let mut placed = 0u64;
    let mut rejected = 0u64;
    for round in 0..rounds {
        for j in 0..jobs_per_round {
            let job_id = round * jobs_per_round + j + 1;
            if scheduler
                .add_job_to_queue(job_id, "type-0", request, 1, ())
                .is_err()
            {
                rejected += 1;
            }
        }
        placed += scheduler.schedule().len() as u64;
    }
    let elapsed = start.elapsed();

    println!(
        "fleet: {} jobs offered, {placed} placed, {rejected} rejected, {} still queued, took {:.1} ms",
        offered,
        scheduler.queue_len(),
        elapsed.as_secs_f64() * 1000.0
    );
    if dump {
        super::dump(&scheduler)?;
    }
    Ok(())
}
