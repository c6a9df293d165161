//! gridpack-scheduler — gang placement of multi-replica workloads.
//!
//! An in-memory bin-packing scheduler that places gang requests (all
//! replicas or none) onto typed worker nodes under cpu, memory and GPU
//! constraints. It keeps no durable state: a reconciliation driver
//! re-reports ground truth every tick and heartbeat pruning sweeps
//! whatever was not reported.
//!
//! # Components
//!
//! - **`nodes`** — Node registry and residual capacity
//! - **`queue`** — Pending gang requests
//! - **`replicas`** — Placed replicas and their consumption
//! - **`staleness`** — Tick-based pruning of nodes and replicas
//! - **`fit`** — Bounded candidate search and best-fit ordering
//! - **`scheduler`** — The call surface and the per-tick placement pass
//! - **`snapshot`** — Serializable state dump
//!
//! # Example
//!
//! ```
//! use gridpack_scheduler::{Resources, Scheduler};
//!
//! let mut sched: Scheduler<()> = Scheduler::with_defaults();
//! sched.register_node("N1", "gpu", Resources::new(8000, 8000, 8)).unwrap();
//! sched.prune_nodes();
//! sched.prune_jobs();
//! sched.add_job_to_queue(1, "gpu", Resources::new(1000, 1000, 1), 1, ()).unwrap();
//!
//! let placed = sched.schedule();
//! assert_eq!(placed[0].node, "N1");
//! ```

pub mod config;
pub mod error;
mod fit;
pub mod nodes;
pub mod queue;
mod replicas;
pub mod scheduler;
pub mod snapshot;
pub mod staleness;
pub mod types;

pub use config::SchedulerConfig;
pub use error::{SchedulerError, SchedulerResult, Table};
pub use nodes::Node;
pub use queue::QueueEntry;
pub use scheduler::Scheduler;
pub use snapshot::SchedulerSnapshot;
pub use staleness::Heartbeat;
pub use types::{AllocatedReplica, JobId, Rank, Resources, Tick};
