//! MetaStore — redb-backed metadata persistence for coral.
//!
//! One redb table per entity, string keys, JSON-encoded values. A small set
//! of generic helpers (`put`/`get`/`scan`/`remove`) carries every entity
//! operation, so the per-entity methods stay focused on keys and semantics:
//! logical deletes, quota materialization, latest-by-timestamp reads. Tests
//! run against the in-memory backend.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use crate::error::MetaResult;
use crate::tables::*;
use crate::types::*;

/// Every table shares one shape: string keys, JSON value bytes.
type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// The store's full table set, bootstrapped at startup.
const ALL_TABLES: [Table; 5] = [
    TENANT_CONTAINERS,
    DEPLOYMENT_STATUS,
    TENANT_QUOTAS,
    METRICS,
    INDEX_METADATA,
];

/// Handle to the metadata store. Cloning is cheap; clones share the backing
/// database.
#[derive(Clone)]
pub struct MetaStore {
    db: Arc<Database>,
}

impl MetaStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path) -> MetaResult<Self> {
        let store = Self::with_database(Database::create(path)?)?;
        debug!(?path, "metadata store ready");
        Ok(store)
    }

    /// An ephemeral store with no file behind it, for tests.
    pub fn open_in_memory() -> MetaResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        Self::with_database(Database::builder().create_with_backend(backend)?)
    }

    fn with_database(db: Database) -> MetaResult<Self> {
        let store = Self { db: Arc::new(db) };
        store.bootstrap_tables()?;
        Ok(store)
    }

    /// Touch every table under one write transaction, which materializes any
    /// that do not exist yet; read transactions never race table creation.
    fn bootstrap_tables(&self) -> MetaResult<()> {
        let txn = self.db.begin_write()?;
        for table in ALL_TABLES {
            txn.open_table(table)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Generic insert into a table.
    fn put<T: serde::Serialize>(&self, table: Table, key: &str, value: &T) -> MetaResult<()> {
        let bytes = serde_json::to_vec(value)?;
        let txn = self.db.begin_write()?;
        {
            let mut t = txn.open_table(table)?;
            t.insert(key, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Generic point lookup from a table.
    fn get<T: serde::de::DeserializeOwned>(
        &self,
        table: Table,
        key: &str,
    ) -> MetaResult<Option<T>> {
        let txn = self.db.begin_read()?;
        let t = txn.open_table(table)?;
        match t.get(key)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Generic full-table scan.
    fn scan<T: serde::de::DeserializeOwned>(&self, table: Table) -> MetaResult<Vec<T>> {
        let txn = self.db.begin_read()?;
        let t = txn.open_table(table)?;
        let mut results = Vec::new();
        for entry in t.iter()? {
            let (_, value) = entry?;
            results.push(serde_json::from_slice(value.value())?);
        }
        Ok(results)
    }

    /// Generic delete. Returns true if the key existed.
    fn remove(&self, table: Table, key: &str) -> MetaResult<bool> {
        let txn = self.db.begin_write()?;
        let existed;
        {
            let mut t = txn.open_table(table)?;
            existed = t.remove(key)?.is_some();
        }
        txn.commit()?;
        Ok(existed)
    }

    // ── Tenant containers ─────────────────────────────────────────

    /// Insert or update a tenant container record.
    pub fn put_tenant_container(&self, container: &TenantContainer) -> MetaResult<()> {
        let key = container.table_key();
        self.put(TENANT_CONTAINERS, &key, container)?;
        debug!(%key, "tenant container stored");
        Ok(())
    }

    /// Get a tenant container by `(user, service)`.
    pub fn get_tenant_container(
        &self,
        user: &str,
        service_name: &str,
    ) -> MetaResult<Option<TenantContainer>> {
        self.get(TENANT_CONTAINERS, &container_key(user, service_name))
    }

    /// Logically delete a tenant container. The record stays in the table
    /// with `deleted = true` to preserve audit history.
    ///
    /// Returns false if no record exists for the pair.
    pub fn delete_tenant_container(&self, user: &str, service_name: &str) -> MetaResult<bool> {
        let Some(mut container) = self.get_tenant_container(user, service_name)? else {
            return Ok(false);
        };
        container.deleted = true;
        container.deleted_at = Some(epoch_secs());
        self.put_tenant_container(&container)?;
        debug!(user, service_name, "tenant container logically deleted");
        Ok(true)
    }

    /// List non-deleted tenant containers belonging to an organization.
    pub fn list_tenant_containers_by_org(&self, org_id: &str) -> MetaResult<Vec<TenantContainer>> {
        let all: Vec<TenantContainer> = self.scan(TENANT_CONTAINERS)?;
        Ok(all
            .into_iter()
            .filter(|c| c.org_id == org_id && !c.deleted)
            .collect())
    }

    // ── Deployment status ─────────────────────────────────────────

    /// Insert or update a deployment status record.
    pub fn put_deployment_status(&self, status: &DeploymentStatus) -> MetaResult<()> {
        self.put(DEPLOYMENT_STATUS, &status.namespace, status)
    }

    /// Get the deployment status for a namespace.
    pub fn get_deployment_status(&self, namespace: &str) -> MetaResult<Option<DeploymentStatus>> {
        self.get(DEPLOYMENT_STATUS, namespace)
    }

    /// List all deployment statuses.
    pub fn list_deployment_status(&self) -> MetaResult<Vec<DeploymentStatus>> {
        self.scan(DEPLOYMENT_STATUS)
    }

    // ── Tenant quotas ─────────────────────────────────────────────

    /// Insert or update a tenant quota.
    pub fn put_tenant_quota(&self, quota: &TenantQuota) -> MetaResult<()> {
        self.put(TENANT_QUOTAS, &quota.tenant_id, quota)
    }

    /// Get a tenant quota. Returns None if the tenant has never been seen.
    pub fn get_tenant_quota(&self, tenant_id: &str) -> MetaResult<Option<TenantQuota>> {
        self.get(TENANT_QUOTAS, tenant_id)
    }

    /// Check whether a tenant may admit a new index/cluster.
    ///
    /// A missing quota is materialized with defaults and persisted before the
    /// check, so first-time tenants are always admitted.
    pub fn check_tenant_quota(&self, tenant_id: &str) -> MetaResult<(bool, TenantQuota)> {
        match self.get_tenant_quota(tenant_id)? {
            Some(quota) => Ok((quota.admits_new(), quota)),
            None => {
                let quota = TenantQuota::default_for(tenant_id, epoch_secs());
                self.put_tenant_quota(&quota)?;
                debug!(tenant_id, "materialized default quota");
                Ok((true, quota))
            }
        }
    }

    /// Adjust a tenant's current index count by `delta` (±1), materializing
    /// the default quota first when absent.
    pub fn update_tenant_quota_usage(&self, tenant_id: &str, delta: i32) -> MetaResult<TenantQuota> {
        let mut quota = match self.get_tenant_quota(tenant_id)? {
            Some(q) => q,
            None => TenantQuota::default_for(tenant_id, epoch_secs()),
        };
        quota.current_indices += delta;
        quota.updated_at = epoch_secs();
        self.put_tenant_quota(&quota)?;
        Ok(quota)
    }

    // ── Metrics ───────────────────────────────────────────────────

    /// Append a metric snapshot.
    pub fn save_metrics(&self, snapshot: &MetricSnapshot) -> MetaResult<()> {
        self.put(METRICS, &snapshot.table_key(), snapshot)
    }

    /// Get the most recent metric snapshot for a namespace, by timestamp.
    pub fn latest_metrics(&self, namespace: &str) -> MetaResult<Option<MetricSnapshot>> {
        let prefix = format!("{namespace}:");
        let txn = self.db.begin_read()?;
        let t = txn.open_table(METRICS)?;
        let mut latest: Option<MetricSnapshot> = None;
        for entry in t.iter()? {
            let (key, value) = entry?;
            if !key.value().starts_with(&prefix) {
                continue;
            }
            let snapshot: MetricSnapshot = serde_json::from_slice(value.value())?;
            if latest
                .as_ref()
                .is_none_or(|l| snapshot.timestamp >= l.timestamp)
            {
                latest = Some(snapshot);
            }
        }
        Ok(latest)
    }

    // ── Index metadata ────────────────────────────────────────────

    /// Insert or update index metadata.
    pub fn put_index_metadata(&self, metadata: &IndexMetadata) -> MetaResult<()> {
        self.put(INDEX_METADATA, &metadata.id, metadata)
    }

    /// Get index metadata by id.
    pub fn get_index_metadata(&self, id: &str) -> MetaResult<Option<IndexMetadata>> {
        self.get(INDEX_METADATA, id)
    }

    /// List all index metadata records.
    pub fn list_index_metadata(&self) -> MetaResult<Vec<IndexMetadata>> {
        self.scan(INDEX_METADATA)
    }

    /// Delete index metadata by id. Returns true if it existed.
    pub fn delete_index_metadata(&self, id: &str) -> MetaResult<bool> {
        self.remove(INDEX_METADATA, id)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_container(org: &str, user: &str, service: &str) -> TenantContainer {
        TenantContainer {
            org_id: org.to_string(),
            user: user.to_string(),
            service_name: service.to_string(),
            namespace: namespace_for(org, user, service),
            replicas: 1,
            cpu: "500m".to_string(),
            memory: "1Gi".to_string(),
            disk: "10Gi".to_string(),
            gpu_count: 0,
            vector_dimension: 128,
            vector_count: 10_000,
            phase: Phase::Creating,
            created_at: 1000,
            sync_time: 1000,
            deleted: false,
            deleted_at: None,
        }
    }

    fn test_status(namespace: &str) -> DeploymentStatus {
        DeploymentStatus {
            namespace: namespace.to_string(),
            org_id: "acme".to_string(),
            user: "alice".to_string(),
            service_name: "search".to_string(),
            phase: Phase::Created,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            disk_usage: 0.0,
            qps: 0.0,
            gpu_count: 0,
            vector_dimension: 128,
            vector_count: 10_000,
            replicas: 1,
            created_at: 1000,
            updated_at: 1000,
            details: HashMap::new(),
        }
    }

    fn test_snapshot(namespace: &str, timestamp: u64) -> MetricSnapshot {
        MetricSnapshot {
            namespace: namespace.to_string(),
            cpu_usage: 0.5,
            memory_usage: 512.0,
            disk_usage: 40.0,
            qps: 120.0,
            timestamp,
        }
    }

    fn test_index_metadata(id: &str) -> IndexMetadata {
        IndexMetadata {
            id: id.to_string(),
            index_name: "vectors".to_string(),
            namespace: "acme-alice-search".to_string(),
            dimension: 128,
            metric: "cosine".to_string(),
            ivf_nlist: 256,
            ivf_nprobe: 8,
            status: "active".to_string(),
            document_count: 0,
            storage_size: "0Gi".to_string(),
            created_by: "alice".to_string(),
            created_at: 1000,
            updated_at: 1000,
        }
    }

    // ── Tenant container CRUD ─────────────────────────────────────

    #[test]
    fn container_put_and_get() {
        let store = MetaStore::open_in_memory().unwrap();
        let container = test_container("acme", "alice", "search");

        store.put_tenant_container(&container).unwrap();
        let retrieved = store.get_tenant_container("alice", "search").unwrap();

        assert_eq!(retrieved, Some(container));
    }

    #[test]
    fn container_get_nonexistent_returns_none() {
        let store = MetaStore::open_in_memory().unwrap();
        assert!(store.get_tenant_container("nobody", "nothing").unwrap().is_none());
    }

    #[test]
    fn container_logical_delete_keeps_record() {
        let store = MetaStore::open_in_memory().unwrap();
        store
            .put_tenant_container(&test_container("acme", "alice", "search"))
            .unwrap();

        assert!(store.delete_tenant_container("alice", "search").unwrap());

        // Record still present, flagged deleted.
        let container = store.get_tenant_container("alice", "search").unwrap().unwrap();
        assert!(container.deleted);
        assert!(container.deleted_at.is_some());
    }

    #[test]
    fn container_delete_nonexistent_returns_false() {
        let store = MetaStore::open_in_memory().unwrap();
        assert!(!store.delete_tenant_container("alice", "search").unwrap());
    }

    #[test]
    fn container_list_by_org_excludes_deleted() {
        let store = MetaStore::open_in_memory().unwrap();
        store.put_tenant_container(&test_container("acme", "alice", "a")).unwrap();
        store.put_tenant_container(&test_container("acme", "bob", "b")).unwrap();
        store.put_tenant_container(&test_container("other", "carol", "c")).unwrap();
        store.delete_tenant_container("bob", "b").unwrap();

        let acme = store.list_tenant_containers_by_org("acme").unwrap();
        assert_eq!(acme.len(), 1);
        assert_eq!(acme[0].user, "alice");
    }

    // ── Deployment status CRUD ────────────────────────────────────

    #[test]
    fn status_put_get_and_list() {
        let store = MetaStore::open_in_memory().unwrap();
        store.put_deployment_status(&test_status("acme-alice-search")).unwrap();
        store.put_deployment_status(&test_status("acme-bob-search")).unwrap();

        let one = store.get_deployment_status("acme-alice-search").unwrap();
        assert!(one.is_some());
        assert!(store.get_deployment_status("missing").unwrap().is_none());

        assert_eq!(store.list_deployment_status().unwrap().len(), 2);
    }

    #[test]
    fn status_update_in_place() {
        let store = MetaStore::open_in_memory().unwrap();
        let mut status = test_status("acme-alice-search");
        store.put_deployment_status(&status).unwrap();

        status.phase = Phase::Scaling;
        status.replicas = 3;
        store.put_deployment_status(&status).unwrap();

        let retrieved = store.get_deployment_status("acme-alice-search").unwrap().unwrap();
        assert_eq!(retrieved.phase, Phase::Scaling);
        assert_eq!(retrieved.replicas, 3);
    }

    // ── Quotas ────────────────────────────────────────────────────

    #[test]
    fn quota_check_materializes_defaults() {
        let store = MetaStore::open_in_memory().unwrap();

        let (admits, quota) = store.check_tenant_quota("alice").unwrap();
        assert!(admits);
        assert_eq!(quota.max_indices, 100);
        assert_eq!(quota.current_indices, 0);

        // The materialized quota is persisted.
        assert!(store.get_tenant_quota("alice").unwrap().is_some());
    }

    #[test]
    fn quota_denies_at_limit() {
        let store = MetaStore::open_in_memory().unwrap();
        let mut quota = TenantQuota::default_for("alice", 1000);
        quota.max_indices = 2;
        quota.current_indices = 2;
        store.put_tenant_quota(&quota).unwrap();

        let (admits, _) = store.check_tenant_quota("alice").unwrap();
        assert!(!admits);
    }

    #[test]
    fn quota_usage_delta_round_trip() {
        let store = MetaStore::open_in_memory().unwrap();

        let quota = store.update_tenant_quota_usage("alice", 1).unwrap();
        assert_eq!(quota.current_indices, 1);

        let quota = store.update_tenant_quota_usage("alice", 1).unwrap();
        assert_eq!(quota.current_indices, 2);

        let quota = store.update_tenant_quota_usage("alice", -1).unwrap();
        assert_eq!(quota.current_indices, 1);
    }

    // ── Metrics ───────────────────────────────────────────────────

    #[test]
    fn metrics_latest_by_timestamp() {
        let store = MetaStore::open_in_memory().unwrap();
        let ns = "acme-alice-search";
        for ts in [1000u64, 1060, 1030] {
            store.save_metrics(&test_snapshot(ns, ts)).unwrap();
        }

        let latest = store.latest_metrics(ns).unwrap().unwrap();
        assert_eq!(latest.timestamp, 1060);
    }

    #[test]
    fn metrics_scoped_by_namespace() {
        let store = MetaStore::open_in_memory().unwrap();
        store.save_metrics(&test_snapshot("acme-a-svc", 1000)).unwrap();
        store.save_metrics(&test_snapshot("acme-b-svc", 2000)).unwrap();

        let latest = store.latest_metrics("acme-a-svc").unwrap().unwrap();
        assert_eq!(latest.timestamp, 1000);
        assert!(store.latest_metrics("acme-c-svc").unwrap().is_none());
    }

    #[test]
    fn metrics_append_preserves_history() {
        let store = MetaStore::open_in_memory().unwrap();
        let ns = "acme-a-svc";
        store.save_metrics(&test_snapshot(ns, 1000)).unwrap();
        store.save_metrics(&test_snapshot(ns, 1030)).unwrap();

        // Saving never replaces earlier snapshots: the latest timestamp is
        // monotone with respect to appends.
        let latest = store.latest_metrics(ns).unwrap().unwrap();
        assert!(latest.timestamp >= 1030);
    }

    // ── Index metadata ────────────────────────────────────────────

    #[test]
    fn index_metadata_crud() {
        let store = MetaStore::open_in_memory().unwrap();
        store.put_index_metadata(&test_index_metadata("idx-1")).unwrap();
        store.put_index_metadata(&test_index_metadata("idx-2")).unwrap();

        assert!(store.get_index_metadata("idx-1").unwrap().is_some());
        assert_eq!(store.list_index_metadata().unwrap().len(), 2);

        assert!(store.delete_index_metadata("idx-1").unwrap());
        assert!(!store.delete_index_metadata("idx-1").unwrap());
        assert!(store.get_index_metadata("idx-1").unwrap().is_none());
    }

    // ── Persistence (on-disk) ─────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("meta.redb");

        {
            let store = MetaStore::open(&db_path).unwrap();
            store
                .put_tenant_container(&test_container("acme", "alice", "search"))
                .unwrap();
        }

        let store = MetaStore::open(&db_path).unwrap();
        let container = store.get_tenant_container("alice", "search").unwrap();
        assert!(container.is_some());
        assert_eq!(container.unwrap().namespace, "acme-alice-search");
    }

    // ── Edge cases ────────────────────────────────────────────────

    #[test]
    fn empty_store_operations() {
        let store = MetaStore::open_in_memory().unwrap();

        assert!(store.list_deployment_status().unwrap().is_empty());
        assert!(store.list_tenant_containers_by_org("acme").unwrap().is_empty());
        assert!(store.list_index_metadata().unwrap().is_empty());
        assert!(store.latest_metrics("any").unwrap().is_none());
        assert!(!store.delete_index_metadata("nope").unwrap());
    }
}
