//! Shared stubs for handler tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use coral_autoscale::{Autoscaler, AutoscalerConfig};
use coral_health::{
    ConsistencyReader, ConsistencyReport, HealthError, ReplicationReader, ReplicationStatus,
};
use coral_meta::MetaStore;
use coral_orchestrator::{Orchestrator, OrchestratorResult};
use coral_provision::{Provision, ProvisionError, ProvisionResult, TenantConfig};
use coral_recovery::{RecoveryConfig, RecoveryManager};
use coral_search::{ClusterStats, DataPlane, SearchResult, ShardInfo, ShardRecovery};
use coral_shards::ShardController;

use crate::ApiState;

pub(crate) struct StubProvisioner {
    pub fail: bool,
}

#[async_trait]
impl Provision for StubProvisioner {
    async fn create(&self, _config: &TenantConfig) -> ProvisionResult<()> {
        if self.fail {
            Err(ProvisionError::Failed {
                operation: "apply".to_string(),
                stderr: "boom".to_string(),
            })
        } else {
            Ok(())
        }
    }

    async fn delete(&self, _namespace: &str) -> ProvisionResult<()> {
        if self.fail {
            Err(ProvisionError::Failed {
                operation: "destroy".to_string(),
                stderr: "boom".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

pub(crate) struct StubOrchestrator;

#[async_trait]
impl Orchestrator for StubOrchestrator {
    async fn cluster_namespaces(&self) -> OrchestratorResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn current_replicas(&self, _namespace: &str) -> OrchestratorResult<i32> {
        Ok(1)
    }

    async fn set_replicas(&self, _namespace: &str, _replicas: i32) -> OrchestratorResult<()> {
        Ok(())
    }

    async fn readiness(&self, _namespace: &str) -> OrchestratorResult<String> {
        Ok("1/1".to_string())
    }

    async fn pod_usage(&self, _namespace: &str) -> OrchestratorResult<(f64, f64)> {
        Ok((0.0, 0.0))
    }

    async fn disk_usage_percent(&self, _namespace: &str) -> OrchestratorResult<f64> {
        Ok(0.0)
    }
}

pub(crate) struct StubDataPlane;

#[async_trait]
impl DataPlane for StubDataPlane {
    async fn shard_allocation(&self) -> SearchResult<Vec<ShardInfo>> {
        Ok(Vec::new())
    }

    async fn update_cluster_settings(&self, _settings: serde_json::Value) -> SearchResult<()> {
        Ok(())
    }

    async fn recovery_status(&self) -> SearchResult<HashMap<String, Vec<ShardRecovery>>> {
        Ok(HashMap::new())
    }

    async fn cluster_stats(&self) -> SearchResult<ClusterStats> {
        Ok(ClusterStats {
            node_count: 2,
            total_shards: 8,
        })
    }
}

#[derive(Default)]
pub(crate) struct StubReplication {
    pub statuses: HashMap<String, ReplicationStatus>,
}

#[async_trait]
impl ReplicationReader for StubReplication {
    async fn replication_status(&self, index: &str) -> Option<ReplicationStatus> {
        self.statuses.get(index).cloned()
    }

    async fn all_replication_statuses(&self) -> HashMap<String, ReplicationStatus> {
        self.statuses.clone()
    }
}

#[derive(Default)]
pub(crate) struct StubConsistency {
    pub reports: HashMap<String, ConsistencyReport>,
    /// Answer for check_index_now; None means "no shards".
    pub probe: Option<ConsistencyReport>,
}

#[async_trait]
impl ConsistencyReader for StubConsistency {
    async fn consistency_report(&self, index: &str) -> Option<ConsistencyReport> {
        self.reports.get(index).cloned()
    }

    async fn all_consistency_reports(&self) -> HashMap<String, ConsistencyReport> {
        self.reports.clone()
    }

    async fn check_index_now(&self, index: &str) -> Result<ConsistencyReport, HealthError> {
        self.probe
            .clone()
            .ok_or_else(|| HealthError::NoShards(index.to_string()))
    }
}

pub(crate) fn state_with(
    provisioner: StubProvisioner,
    replication: StubReplication,
    consistency: StubConsistency,
) -> ApiState {
    let store = MetaStore::open_in_memory().unwrap();
    let orchestrator = Arc::new(StubOrchestrator);
    let data_plane = Arc::new(StubDataPlane);

    let autoscaler = Arc::new(Autoscaler::new(
        store.clone(),
        orchestrator.clone(),
        AutoscalerConfig::default(),
        Duration::from_secs(60),
    ));
    let replication: Arc<dyn ReplicationReader> = Arc::new(replication);
    let consistency: Arc<dyn ConsistencyReader> = Arc::new(consistency);
    let recovery = RecoveryManager::new(
        data_plane.clone(),
        replication.clone(),
        consistency.clone(),
        RecoveryConfig::default(),
    );
    let shards = Arc::new(ShardController::new(
        data_plane.clone(),
        Duration::from_secs(30),
    ));

    ApiState {
        store,
        provisioner: Arc::new(provisioner),
        orchestrator,
        data_plane,
        autoscaler,
        replication,
        consistency,
        recovery,
        shards,
    }
}

pub(crate) fn test_state() -> ApiState {
    state_with(
        StubProvisioner { fail: false },
        StubReplication::default(),
        StubConsistency::default(),
    )
}
