//! Shared domain types for the scheduler.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a workload request (gang). Unique while queued.
pub type JobId = u64;

/// Rank of a replica within its gang, `0..replicas`.
pub type Rank = u32;

/// One scheduling generation. Entities remember the tick they were last
/// reported in; anything behind the current tick is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tick(pub u64);

impl Tick {
    pub fn next(self) -> Tick {
        Tick(self.0 + 1)
    }

    /// Number of ticks between `earlier` and `self`, zero if `earlier` is ahead.
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

// ── Resources ─────────────────────────────────────────────────────

/// A cpu/memory/gpu triple.
///
/// Used both as a requirement (per replica) and as a node's residual
/// capacity. Fields are signed: ground-truth reports are trusted even
/// when they overcommit a node, which drives the residual below zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resources {
    /// Virtual CPU in millis (1000 = one core).
    pub cpu_millis: i64,
    pub memory_bytes: i64,
    pub gpus: i64,
}

impl Resources {
    pub const ZERO: Resources = Resources {
        cpu_millis: 0,
        memory_bytes: 0,
        gpus: 0,
    };

    pub fn new(cpu_millis: i64, memory_bytes: i64, gpus: i64) -> Self {
        Self {
            cpu_millis,
            memory_bytes,
            gpus,
        }
    }

    /// True when every dimension of `self` can hold `req`.
    pub fn fits(&self, req: &Resources) -> bool {
        self.cpu_millis >= req.cpu_millis
            && self.memory_bytes >= req.memory_bytes
            && self.gpus >= req.gpus
    }

    pub fn is_negative(&self) -> bool {
        self.cpu_millis < 0 || self.memory_bytes < 0 || self.gpus < 0
    }

    pub fn subtract(&mut self, other: &Resources) {
        self.cpu_millis -= other.cpu_millis;
        self.memory_bytes -= other.memory_bytes;
        self.gpus -= other.gpus;
    }

    pub fn add(&mut self, other: &Resources) {
        self.cpu_millis += other.cpu_millis;
        self.memory_bytes += other.memory_bytes;
        self.gpus += other.gpus;
    }

    /// `self - other`, or `None` if any dimension leaves the `i64` range.
    pub fn checked_sub(&self, other: &Resources) -> Option<Resources> {
        Some(Resources {
            cpu_millis: self.cpu_millis.checked_sub(other.cpu_millis)?,
            memory_bytes: self.memory_bytes.checked_sub(other.memory_bytes)?,
            gpus: self.gpus.checked_sub(other.gpus)?,
        })
    }

    /// `self + other`, or `None` if any dimension leaves the `i64` range.
    pub fn checked_add(&self, other: &Resources) -> Option<Resources> {
        Some(Resources {
            cpu_millis: self.cpu_millis.checked_add(other.cpu_millis)?,
            memory_bytes: self.memory_bytes.checked_add(other.memory_bytes)?,
            gpus: self.gpus.checked_add(other.gpus)?,
        })
    }

    /// Best-fit ordering key: GPUs are the scarcest dimension, then CPU,
    /// then memory.
    pub fn best_fit_key(&self) -> (i64, i64, i64) {
        (self.gpus, self.cpu_millis, self.memory_bytes)
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cpu={}m mem={}B gpu={}",
            self.cpu_millis, self.memory_bytes, self.gpus
        )
    }
}

// ── Placement result ──────────────────────────────────────────────

/// A replica placed on (or reported running on) a named node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedReplica<P> {
    pub job_id: JobId,
    pub rank: Rank,
    pub node: String,
    pub payload: P,
}
