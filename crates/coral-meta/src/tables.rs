//! redb table definitions for the coral metadata store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Composite keys follow the pattern `{user}/{service}` or
//! `{namespace}:{timestamp}`.

use redb::TableDefinition;

/// Tenant containers keyed by `{user}/{service_name}`.
pub const TENANT_CONTAINERS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("tenant_containers");

/// Deployment statuses keyed by `{namespace}`.
pub const DEPLOYMENT_STATUS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("deployment_status");

/// Tenant quotas keyed by `{tenant_id}`.
pub const TENANT_QUOTAS: TableDefinition<&str, &[u8]> = TableDefinition::new("tenant_quotas");

/// Metric snapshots keyed by `{namespace}:{timestamp:020}`.
pub const METRICS: TableDefinition<&str, &[u8]> = TableDefinition::new("metrics");

/// Index metadata keyed by `{id}`.
pub const INDEX_METADATA: TableDefinition<&str, &[u8]> = TableDefinition::new("index_metadata");
