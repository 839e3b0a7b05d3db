//! Report types produced by the health loops.

use serde::{Deserialize, Serialize};

// ── Replication ───────────────────────────────────────────────────

/// Per-index replication health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationHealth {
    Healthy,
    Syncing,
    Degraded,
    Failed,
}

/// Aggregated replication state of one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationStatus {
    pub index: String,
    pub total_shards: usize,
    pub replicated_shards: usize,
    pub unreplicated_shards: usize,
    /// Percentage of shard copies in the started state (0–100).
    pub progress: f64,
    pub health: ReplicationHealth,
    /// Unix timestamp (seconds) of the producing check.
    pub last_check: u64,
}

// ── Consistency ───────────────────────────────────────────────────

/// Overall consistency verdict for an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyStatus {
    Consistent,
    Inconsistent,
    Error,
    Checking,
}

/// Primary-vs-replica comparison for a single shard group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardConsistencyReport {
    pub shard_id: i32,
    pub primary_node: String,
    pub replica_nodes: Vec<String>,
    pub primary_doc_count: i64,
    pub replica_doc_counts: Vec<i64>,
    pub primary_store_size: String,
    pub replica_store_sizes: Vec<String>,
    pub is_consistent: bool,
    pub issues: Vec<String>,
}

/// Consistency check result for one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub index: String,
    pub status: ConsistencyStatus,
    pub total_shards: usize,
    pub consistent_shards: usize,
    pub inconsistent_shards: usize,
    pub shard_reports: Vec<ShardConsistencyReport>,
    pub issues: Vec<String>,
    /// Unix timestamp (seconds) of the producing check.
    pub check_time: u64,
}
