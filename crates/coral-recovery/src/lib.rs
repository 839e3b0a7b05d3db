//! coral-recovery — automatic repair of degraded and inconsistent indices.
//!
//! A background loop consumes the replication monitor's and consistency
//! checker's cached reports (through their narrow reader capabilities) and
//! issues corrective actions against the data plane: shard reallocation for
//! degraded replication, resynchronization for divergent replicas. Actions
//! retry with a fixed back-off, record themselves in an append-only history,
//! and schedule a post-recovery verification after success.
//!
//! The active-by-index map gives mutual exclusion per index: while an action
//! is pending, running, or retrying, no second action can be triggered for
//! the same index.

pub mod action;
pub mod manager;

pub use action::{RecoveryAction, RecoveryKind, RecoveryPhase};
pub use manager::{RecoveryConfig, RecoveryManager};
