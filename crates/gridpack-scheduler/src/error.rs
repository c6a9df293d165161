//! Scheduler error types.

use thiserror::Error;

/// Which bounded table ran out of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Nodes,
    Queue,
    Replicas,
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Table::Nodes => "node registry",
            Table::Queue => "job queue",
            Table::Replicas => "replica table",
        };
        f.write_str(name)
    }
}

/// Errors returned by scheduler operations.
///
/// A failed call never leaves partial state behind.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A bounded table is full. Callers should apply backpressure rather
    /// than retry the same call.
    #[error("{table} is full ({limit} slots)")]
    CapacityExceeded { table: Table, limit: usize },

    /// A replica was reported on a node that is not registered.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_message_names_table() {
        let err = SchedulerError::CapacityExceeded {
            table: Table::Queue,
            limit: 16,
        };
        assert_eq!(err.to_string(), "job queue is full (16 slots)");
    }
}
