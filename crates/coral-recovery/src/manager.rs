//! Recovery manager — triggers, executes, and retries corrective actions.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::json;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use coral_health::{
    ConsistencyReader, ConsistencyStatus, ReplicationHealth, ReplicationReader,
};
use coral_search::{DataPlane, ShardState};

use crate::action::{RecoveryAction, RecoveryKind, RecoveryPhase};

/// Recovery manager knobs; every delay is configurable so operators can
/// tighten or relax the repair cadence at runtime.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    pub enabled: bool,
    pub max_retries: u32,
    /// Back-off between attempts of one action.
    pub retry_delay: Duration,
    /// Cadence of the check loop.
    pub check_interval: Duration,
    /// How long reallocation settings get to take effect before re-reading
    /// shard allocation.
    pub reallocate_settle: Duration,
    /// Poll cadence while waiting for a resync to converge.
    pub resync_poll: Duration,
    /// Hard ceiling on one resync attempt.
    pub resync_deadline: Duration,
    /// How long a rebalance gets before the action is considered done.
    pub rebalance_settle: Duration,
    /// Pause between a successful action and its verification.
    pub verify_delay: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            retry_delay: Duration::from_secs(30),
            check_interval: Duration::from_secs(60),
            reallocate_settle: Duration::from_secs(10),
            resync_poll: Duration::from_secs(10),
            resync_deadline: Duration::from_secs(300),
            rebalance_settle: Duration::from_secs(30),
            verify_delay: Duration::from_secs(60),
        }
    }
}

/// Drives automatic recovery from the health loops' cached reports.
///
/// Cheap to clone; clones share the same active map, history, and config,
/// so spawned executions and the check loop observe one state.
#[derive(Clone)]
pub struct RecoveryManager {
    inner: Arc<RecoveryInner>,
}

struct RecoveryInner {
    data_plane: Arc<dyn DataPlane>,
    replication: Arc<dyn ReplicationReader>,
    consistency: Arc<dyn ConsistencyReader>,
    config: RwLock<RecoveryConfig>,
    /// Active action per index. One lock makes the is-recovering check and
    /// the insert atomic, so two triggers cannot race past the guard.
    active: Mutex<HashMap<String, RecoveryAction>>,
    /// Append-only record of every action ever triggered.
    history: RwLock<Vec<RecoveryAction>>,
}

impl RecoveryManager {
    pub fn new(
        data_plane: Arc<dyn DataPlane>,
        replication: Arc<dyn ReplicationReader>,
        consistency: Arc<dyn ConsistencyReader>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RecoveryInner {
                data_plane,
                replication,
                consistency,
                config: RwLock::new(config),
                active: Mutex::new(HashMap::new()),
                history: RwLock::new(Vec::new()),
            }),
        }
    }

    // ── Configuration ─────────────────────────────────────────────

    pub async fn config(&self) -> RecoveryConfig {
        self.inner.config.read().await.clone()
    }

    pub async fn set_enabled(&self, enabled: bool) {
        self.inner.config.write().await.enabled = enabled;
        info!(enabled, "auto recovery toggled");
    }

    pub async fn set_max_retries(&self, max_retries: u32) {
        self.inner.config.write().await.max_retries = max_retries;
    }

    pub async fn set_retry_delay(&self, delay: Duration) {
        self.inner.config.write().await.retry_delay = delay;
    }

    pub async fn set_check_interval(&self, interval: Duration) {
        self.inner.config.write().await.check_interval = interval;
    }

    // ── Readers ───────────────────────────────────────────────────

    /// Every action ever triggered, oldest first.
    pub async fn history(&self) -> Vec<RecoveryAction> {
        self.inner.history.read().await.clone()
    }

    /// Actions currently holding an index's exclusivity slot.
    pub async fn active(&self) -> Vec<RecoveryAction> {
        self.inner.active.lock().await.values().cloned().collect()
    }

    /// Whether an index has an active recovery.
    pub async fn is_recovering(&self, index: &str) -> bool {
        self.inner.active
            .lock()
            .await
            .get(index)
            .is_some_and(|a| a.is_active())
    }

    // ── Check loop ────────────────────────────────────────────────

    /// One detection pass over both report caches.
    pub async fn check_and_recover(&self) {
        if !self.inner.config.read().await.enabled {
            return;
        }
        debug!("checking for recovery opportunities");

        let statuses = self.inner.replication.all_replication_statuses().await;
        for (index, status) in statuses {
            match status.health {
                ReplicationHealth::Failed => {
                    self.trigger(
                        &index,
                        RecoveryKind::Reallocate,
                        &format!("replication failed: {:.1}% complete", status.progress),
                        None,
                    )
                    .await;
                }
                ReplicationHealth::Degraded => {
                    self.trigger(
                        &index,
                        RecoveryKind::Reallocate,
                        &format!("degraded: {} unassigned shards", status.unreplicated_shards),
                        None,
                    )
                    .await;
                }
                _ => {}
            }
        }

        let reports = self.inner.consistency.all_consistency_reports().await;
        for (index, report) in reports {
            match report.status {
                ConsistencyStatus::Inconsistent => {
                    self.trigger(
                        &index,
                        RecoveryKind::Resync,
                        &format!(
                            "inconsistent: {}/{} shards",
                            report.inconsistent_shards, report.total_shards
                        ),
                        None,
                    )
                    .await;
                }
                ConsistencyStatus::Error => {
                    self.trigger(
                        &index,
                        RecoveryKind::Resync,
                        &format!(
                            "severe: {}/{} shards inconsistent",
                            report.inconsistent_shards, report.total_shards
                        ),
                        None,
                    )
                    .await;
                }
                _ => {}
            }
        }
    }

    /// Trigger a recovery action unless the index already has an active one.
    ///
    /// Returns false when suppressed by the exclusivity guard.
    pub fn trigger<'a>(
        &'a self,
        index: &'a str,
        kind: RecoveryKind,
        description: &'a str,
        max_retries: Option<u32>,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(self.trigger_inner(index, kind, description, max_retries))
    }

    async fn trigger_inner(
        &self,
        index: &str,
        kind: RecoveryKind,
        description: &str,
        max_retries: Option<u32>,
    ) -> bool {
        let max_retries = match max_retries {
            Some(n) => n,
            None => self.inner.config.read().await.max_retries,
        };

        let action = {
            let mut active = self.inner.active.lock().await;
            if active.get(index).is_some_and(|a| a.is_active()) {
                debug!(%index, "recovery already active, trigger suppressed");
                return false;
            }

            let action = RecoveryAction {
                id: format!("{index}-{}-{}", kind.as_str(), epoch_secs()),
                index: index.to_string(),
                kind,
                phase: RecoveryPhase::Pending,
                attempts: 0,
                max_retries,
                started_at: epoch_secs(),
                ended_at: None,
                description: description.to_string(),
                error: None,
            };
            active.insert(index.to_string(), action.clone());
            action
        };

        info!(
            %index,
            kind = kind.as_str(),
            description,
            "recovery triggered"
        );
        self.inner.history.write().await.push(action.clone());

        let manager = self.clone();
        tokio::spawn(async move {
            manager.execute(action).await;
        });
        true
    }

    // ── Execution ─────────────────────────────────────────────────

    /// Drive one action through attempts until success or exhaustion.
    async fn execute(&self, mut action: RecoveryAction) {
        loop {
            action.phase = RecoveryPhase::Running;
            action.attempts += 1;
            self.publish(&action).await;
            info!(
                id = %action.id,
                attempt = action.attempts,
                max = action.max_retries,
                "executing recovery"
            );

            match self.dispatch(&action).await {
                Ok(()) => {
                    action.phase = RecoveryPhase::Success;
                    action.ended_at = Some(epoch_secs());
                    self.retire(&action).await;
                    info!(
                        id = %action.id,
                        attempts = action.attempts,
                        "recovery succeeded"
                    );

                    if action.kind != RecoveryKind::Verify {
                        let manager = self.clone();
                        let index = action.index.clone();
                        tokio::spawn(async move {
                            let delay = manager.config().await.verify_delay;
                            tokio::time::sleep(delay).await;
                            manager
                                .trigger(
                                    &index,
                                    RecoveryKind::Verify,
                                    "post-recovery verification",
                                    Some(1),
                                )
                                .await;
                        });
                    }
                    return;
                }
                Err(e) => {
                    action.error = Some(e.clone());
                    if action.attempts < action.max_retries {
                        action.phase = RecoveryPhase::Retrying;
                        self.publish(&action).await;
                        warn!(id = %action.id, error = %e, "recovery failed, will retry");
                        let delay = self.inner.config.read().await.retry_delay;
                        tokio::time::sleep(delay).await;
                    } else {
                        action.phase = RecoveryPhase::Failed;
                        action.ended_at = Some(epoch_secs());
                        self.retire(&action).await;
                        warn!(
                            id = %action.id,
                            attempts = action.attempts,
                            error = %e,
                            "recovery failed permanently"
                        );
                        return;
                    }
                }
            }
        }
    }

    /// Reflect an in-flight transition in the active map and history.
    async fn publish(&self, action: &RecoveryAction) {
        self.inner.active
            .lock()
            .await
            .insert(action.index.clone(), action.clone());
        self.update_history(action).await;
    }

    /// Release the index's slot and record the terminal state.
    async fn retire(&self, action: &RecoveryAction) {
        self.inner.active.lock().await.remove(&action.index);
        self.update_history(action).await;
    }

    async fn update_history(&self, action: &RecoveryAction) {
        let mut history = self.inner.history.write().await;
        if let Some(entry) = history.iter_mut().rev().find(|a| a.id == action.id) {
            *entry = action.clone();
        }
    }

    async fn dispatch(&self, action: &RecoveryAction) -> Result<(), String> {
        match action.kind {
            RecoveryKind::Reallocate => self.perform_reallocate(&action.index).await,
            RecoveryKind::Resync => self.perform_resync(&action.index).await,
            RecoveryKind::Rebalance => self.perform_rebalance(&action.index).await,
            RecoveryKind::Verify => self.perform_verify(&action.index).await,
        }
    }

    /// Re-enable allocation and confirm the index's shards all found a node.
    async fn perform_reallocate(&self, index: &str) -> Result<(), String> {
        let settings = json!({
            "transient": {
                "cluster.routing.allocation.enable": "all",
                "cluster.routing.rebalance.enable": "all"
            }
        });
        self.inner.data_plane
            .update_cluster_settings(settings)
            .await
            .map_err(|e| format!("failed to enable allocation: {e}"))?;

        let settle = self.inner.config.read().await.reallocate_settle;
        tokio::time::sleep(settle).await;

        let shards = self
            .inner
            .data_plane
            .shard_allocation()
            .await
            .map_err(|e| format!("failed to check allocation status: {e}"))?;

        let unassigned = shards
            .iter()
            .filter(|s| s.index == index && s.state == ShardState::Unassigned)
            .count();
        if unassigned > 0 {
            return Err(format!("still have {unassigned} unassigned shards"));
        }
        Ok(())
    }

    /// Raise recovery throughput and poll until replicas converge.
    async fn perform_resync(&self, index: &str) -> Result<(), String> {
        let settings = json!({
            "transient": {
                "indices.recovery.max_bytes_per_sec": "100mb",
                "cluster.routing.allocation.node_concurrent_recoveries": 4
            }
        });
        self.inner.data_plane
            .update_cluster_settings(settings)
            .await
            .map_err(|e| format!("failed to update recovery settings: {e}"))?;

        let (poll, deadline_in) = {
            let config = self.inner.config.read().await;
            (config.resync_poll, config.resync_deadline)
        };
        let deadline = tokio::time::Instant::now() + deadline_in;

        loop {
            match self.inner.consistency.check_index_now(index).await {
                Ok(report) if report.status == ConsistencyStatus::Consistent => {
                    info!(%index, "resync converged");
                    return Ok(());
                }
                Ok(report) => {
                    debug!(
                        %index,
                        consistent = report.consistent_shards,
                        total = report.total_shards,
                        "resync in progress"
                    );
                }
                Err(e) => {
                    warn!(%index, error = %e, "consistency probe failed during resync");
                }
            }

            if tokio::time::Instant::now() + poll > deadline {
                return Err(format!("resync timeout after {}s", deadline_in.as_secs()));
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Push balance weights and give the engine time to move shards.
    async fn perform_rebalance(&self, index: &str) -> Result<(), String> {
        let settings = json!({
            "transient": {
                "cluster.routing.rebalance.enable": "all",
                "cluster.routing.allocation.balance.shard": 0.45,
                "cluster.routing.allocation.balance.index": 0.55,
                "cluster.routing.allocation.balance.threshold": 1.0
            }
        });
        self.inner.data_plane
            .update_cluster_settings(settings)
            .await
            .map_err(|e| format!("failed to trigger rebalance: {e}"))?;

        debug!(%index, "rebalance settings applied, settling");
        let settle = self.inner.config.read().await.rebalance_settle;
        tokio::time::sleep(settle).await;
        Ok(())
    }

    /// Post-recovery gate: replication healthy and replicas consistent.
    async fn perform_verify(&self, index: &str) -> Result<(), String> {
        if let Some(status) = self.inner.replication.replication_status(index).await {
            if status.health != ReplicationHealth::Healthy {
                return Err(format!("replication status is {:?}", status.health));
            }
        }

        let report = self
            .inner
            .consistency
            .check_index_now(index)
            .await
            .map_err(|e| format!("failed to check consistency: {e}"))?;
        if report.status != ConsistencyStatus::Consistent {
            return Err(format!("consistency check failed: {:?}", report.status));
        }

        info!(%index, "verification passed");
        Ok(())
    }

    /// Run the recovery loop until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.inner.config.read().await.check_interval;
        info!(interval_secs = interval.as_secs(), "recovery manager started");

        loop {
            let interval = self.inner.config.read().await.check_interval;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.check_and_recover().await;
                }
                _ = shutdown.changed() => {
                    info!("recovery manager shutting down");
                    break;
                }
            }
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
