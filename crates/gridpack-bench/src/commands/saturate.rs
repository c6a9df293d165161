use std::time::Instant;

use gridpack_scheduler::{Resources, Scheduler, SchedulerConfig};
use tracing::info;

const NODE: Resources = Resources {
    cpu_millis: 8000,
    memory_bytes: 8000,
    gpus: 8,
};

/// Keep a single node saturated: every iteration the previous job is
/// never reported back, gets pruned, and a new full-node job takes its
/// place.
pub fn run(config: SchedulerConfig, iterations: u64, dump: bool) -> anyhow::Result<()> {
    let mut scheduler: Scheduler<()> = Scheduler::new(config)?;
    scheduler.register_node("gpu", "gpu", NODE)?;

    let start = Instant::now();
    let mut placed = 0u64;
    for i in 0..iterations {
        if i % 10_000 == 0 {
            info!(iteration = i, placed, "saturate progress");
        }
        scheduler.prune_jobs();
        scheduler.add_job_to_queue(100 + i, "gpu", NODE, 1, ())?;
        placed += scheduler.schedule().len() as u64;
    }
    let elapsed = start.elapsed();

    println!(
        "saturate: {iterations} iterations, {placed} replicas placed in {:.1} ms",
        elapsed.as_secs_f64() * 1000.0
    );
    if dump {
        super::dump(&scheduler)?;
    }
    Ok(())
}
