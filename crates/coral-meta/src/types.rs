//! Domain types for the coral metadata store.
//!
//! These types represent the persisted state of tenant clusters: the declared
//! desired state (`TenantContainer`), the observed state (`DeploymentStatus`),
//! per-user quotas, append-only metric snapshots, and vector-index metadata.
//! All types are serializable to/from JSON for storage in redb tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a tenant's namespace.
pub type Namespace = String;

/// Build the namespace for a tenant triple.
///
/// This format is the join key across the store, the orchestrator, and the
/// data plane and must not be altered.
pub fn namespace_for(org_id: &str, user: &str, service_name: &str) -> Namespace {
    format!("{org_id}-{user}-{service_name}")
}

// ── Lifecycle ─────────────────────────────────────────────────────

/// Lifecycle and load phase of a tenant cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Creating,
    Created,
    Scaling,
    HighLoad,
    Normal,
    LowLoad,
    Deleted,
    Failed,
}

// ── Tenant container ──────────────────────────────────────────────

/// Declared desired state for a tenant's cluster.
///
/// Created on first provision, mutated on scale or phase change, and
/// logically deleted on uninstall. Records are never physically removed, so
/// the audit trail survives the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantContainer {
    pub org_id: String,
    pub user: String,
    pub service_name: String,
    pub namespace: Namespace,
    pub replicas: i32,
    pub cpu: String,
    pub memory: String,
    pub disk: String,
    pub gpu_count: i32,
    pub vector_dimension: i32,
    pub vector_count: i64,
    pub phase: Phase,
    /// Unix timestamp (seconds) when this record was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last sync with the orchestrator.
    pub sync_time: u64,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<u64>,
}

impl TenantContainer {
    /// Build the composite key for the tenant containers table.
    pub fn table_key(&self) -> String {
        container_key(&self.user, &self.service_name)
    }
}

/// Build the tenant containers key for a `(user, service)` pair.
pub fn container_key(user: &str, service_name: &str) -> String {
    format!("{user}/{service_name}")
}

// ── Deployment status ─────────────────────────────────────────────

/// Observed state of a tenant cluster, one per namespace.
///
/// Written by the metric collector (usage + load tier) and the autoscaler
/// (replicas + phase).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentStatus {
    pub namespace: Namespace,
    pub org_id: String,
    pub user: String,
    pub service_name: String,
    pub phase: Phase,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub qps: f64,
    pub gpu_count: i32,
    pub vector_dimension: i32,
    pub vector_count: i64,
    pub replicas: i32,
    pub created_at: u64,
    pub updated_at: u64,
    /// Free-form provisioning details (resource requests, disk size, …).
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
}

// ── Tenant quota ──────────────────────────────────────────────────

/// Per-user quota record.
///
/// A missing quota is materialized with these defaults on first read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantQuota {
    pub tenant_id: String,
    pub max_indices: i32,
    pub max_storage: String,
    pub current_indices: i32,
    pub current_storage: String,
    pub created_at: u64,
    pub updated_at: u64,
}

impl TenantQuota {
    /// Default quota for a tenant seen for the first time.
    pub fn default_for(tenant_id: &str, now: u64) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            max_indices: 100,
            max_storage: "1Ti".to_string(),
            current_indices: 0,
            current_storage: "0Gi".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a new index/cluster may be admitted under this quota.
    pub fn admits_new(&self) -> bool {
        self.current_indices < self.max_indices
    }
}

// ── Metrics ───────────────────────────────────────────────────────

/// Point-in-time resource usage snapshot for a namespace. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSnapshot {
    pub namespace: Namespace,
    /// CPU usage in cores.
    pub cpu_usage: f64,
    /// Memory usage in MB.
    pub memory_usage: f64,
    /// Disk usage as a percentage (0–100).
    pub disk_usage: f64,
    /// Query rate, requests per second.
    pub qps: f64,
    /// Unix timestamp (seconds).
    pub timestamp: u64,
}

impl MetricSnapshot {
    /// Build the composite key for the metrics table.
    ///
    /// Timestamps are zero-padded so lexicographic key order matches
    /// chronological order within a namespace prefix.
    pub fn table_key(&self) -> String {
        format!("{}:{:020}", self.namespace, self.timestamp)
    }
}

// ── Index metadata ────────────────────────────────────────────────

/// Metadata for a vector index hosted in a tenant cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexMetadata {
    pub id: String,
    pub index_name: String,
    pub namespace: Namespace,
    pub dimension: i32,
    /// Distance metric: "l2", "cosine", "dot".
    pub metric: String,
    pub ivf_nlist: i32,
    pub ivf_nprobe: i32,
    /// "active", "building", "deleted".
    pub status: String,
    pub document_count: i64,
    pub storage_size: String,
    pub created_by: String,
    pub created_at: u64,
    pub updated_at: u64,
}
