//! Wire types for the search engine's cat/recovery/stats APIs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Shards ────────────────────────────────────────────────────────

/// Role of a shard copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardRole {
    #[serde(rename = "p")]
    Primary,
    #[serde(rename = "r")]
    Replica,
}

/// Allocation state of a shard copy as reported by `/_cat/shards`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardState {
    Started,
    Initializing,
    Relocating,
    Unassigned,
}

/// One row of `/_cat/shards?format=json`.
///
/// `docs` and `store` are strings in the cat API and absent for unassigned
/// shards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub index: String,
    /// Shard number, reported as a string by the cat API.
    pub shard: String,
    pub prirep: ShardRole,
    pub state: ShardState,
    #[serde(default)]
    pub docs: Option<String>,
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
}

impl ShardInfo {
    pub fn is_primary(&self) -> bool {
        self.prirep == ShardRole::Primary
    }

    /// Document count, zero when missing or unparsable.
    pub fn doc_count(&self) -> i64 {
        self.docs
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(0)
    }

    /// Node name, empty when unassigned.
    pub fn node_name(&self) -> &str {
        self.node.as_deref().unwrap_or("")
    }

    /// Store size string, empty when missing.
    pub fn store_size(&self) -> &str {
        self.store.as_deref().unwrap_or("")
    }
}

// ── Recovery ──────────────────────────────────────────────────────

/// One in-flight shard recovery from `/_recovery?active_only=true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardRecovery {
    pub index: String,
    pub shard: i64,
    /// "PEER", "STORE", "SNAPSHOT", …
    pub kind: String,
    /// init, index, verify_index, translog, finalize, done.
    pub stage: String,
    pub source_node: String,
    pub target_node: String,
    pub bytes_recovered: i64,
    pub bytes_total: i64,
    /// Progress percentage string, e.g. "87.5%".
    pub percent: String,
}

// ── Cluster stats ─────────────────────────────────────────────────

/// Numeric tallies from `/_cluster/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub node_count: u64,
    pub total_shards: u64,
}

impl ClusterStats {
    /// Average shards per node; zero when the cluster reports no nodes.
    pub fn average_shards_per_node(&self) -> f64 {
        if self.node_count == 0 {
            return 0.0;
        }
        self.total_shards as f64 / self.node_count as f64
    }
}

// ── Indices ───────────────────────────────────────────────────────

/// One row of `/_cat/indices?format=json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub index: String,
    #[serde(default)]
    pub health: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "docs.count", default)]
    pub docs_count: Option<String>,
    #[serde(rename = "store.size", default)]
    pub store_size: Option<String>,
}

// ── Payload parsing ───────────────────────────────────────────────

/// Parse the `/_recovery?active_only=true` payload into per-index recoveries.
///
/// The engine nests each shard's progress under `index.size`; rows that lack
/// the expected fields default to zero rather than failing the whole payload.
pub fn parse_recovery_payload(
    payload: &serde_json::Value,
) -> HashMap<String, Vec<ShardRecovery>> {
    let mut recoveries: HashMap<String, Vec<ShardRecovery>> = HashMap::new();

    let Some(indices) = payload.as_object() else {
        return recoveries;
    };

    for (index, data) in indices {
        let Some(shards) = data.get("shards").and_then(|s| s.as_array()) else {
            continue;
        };
        for shard in shards {
            let size = shard.get("index").and_then(|i| i.get("size"));
            recoveries
                .entry(index.clone())
                .or_default()
                .push(ShardRecovery {
                    index: index.clone(),
                    shard: shard.get("id").and_then(|v| v.as_i64()).unwrap_or(0),
                    kind: str_field(shard, "type"),
                    stage: str_field(shard, "stage"),
                    source_node: node_name(shard, "source"),
                    target_node: node_name(shard, "target"),
                    bytes_recovered: size
                        .and_then(|s| s.get("recovered_in_bytes"))
                        .and_then(|v| v.as_i64())
                        .unwrap_or(0),
                    bytes_total: size
                        .and_then(|s| s.get("total_in_bytes"))
                        .and_then(|v| v.as_i64())
                        .unwrap_or(0),
                    percent: size
                        .and_then(|s| s.get("percent"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("0%")
                        .to_string(),
                });
        }
    }

    recoveries
}

/// Parse `/_cluster/stats` into numeric tallies.
///
/// `nodes.count` is an object (`{"total": n, …}`) on current engines and a
/// bare number on older ones; both shapes are accepted.
pub fn parse_cluster_stats(payload: &serde_json::Value) -> Option<ClusterStats> {
    let count = payload.get("nodes")?.get("count")?;
    let node_count = count
        .as_u64()
        .or_else(|| count.get("total").and_then(|t| t.as_u64()))?;

    let total_shards = payload
        .get("indices")?
        .get("shards")?
        .get("total")?
        .as_u64()?;

    Some(ClusterStats {
        node_count,
        total_shards,
    })
}

fn str_field(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn node_name(shard: &serde_json::Value, side: &str) -> String {
    shard
        .get(side)
        .and_then(|s| s.get("name"))
        .and_then(|n| n.as_str())
        .unwrap_or("")
        .to_string()
}
