pub mod fleet;
pub mod saturate;
pub mod soak;

use gridpack_scheduler::Scheduler;

/// Print the scheduler state as pretty JSON.
pub fn dump<P: Clone>(scheduler: &Scheduler<P>) -> anyhow::Result<()> {
    let snapshot = scheduler.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
