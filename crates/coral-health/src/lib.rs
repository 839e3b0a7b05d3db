//! coral-health — replication and consistency observation for tenant indices.
//!
//! Two loops poll the data plane and cache their findings in memory:
//!
//! - the **replication monitor** aggregates per-shard allocation state into
//!   per-index replication health;
//! - the **consistency checker** cross-compares primary and replica shard
//!   statistics to detect divergence.
//!
//! The recovery manager consumes both caches through the narrow
//! [`ReplicationReader`] and [`ConsistencyReader`] capabilities rather than
//! holding the loops themselves.

pub mod consistency;
pub mod replication;
pub mod types;

use thiserror::Error;

pub use consistency::{ConsistencyChecker, ConsistencyReader};
pub use replication::{ReplicationMonitor, ReplicationReader};
pub use types::*;

/// Errors from health observation.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error(transparent)]
    DataPlane(#[from] coral_search::SearchError),

    #[error("no shards found for index: {0}")]
    NoShards(String),
}
