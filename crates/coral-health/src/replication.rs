//! Replication monitor — aggregates shard allocation into per-index health.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use coral_search::{DataPlane, ShardInfo, ShardState};

use crate::types::{ReplicationHealth, ReplicationStatus};

/// Read capability over the replication cache.
#[async_trait]
pub trait ReplicationReader: Send + Sync {
    /// Current status for one index.
    async fn replication_status(&self, index: &str) -> Option<ReplicationStatus>;

    /// Current status for every index.
    async fn all_replication_statuses(&self) -> HashMap<String, ReplicationStatus>;
}

/// Polls shard allocation and caches per-index replication health.
pub struct ReplicationMonitor {
    data_plane: Arc<dyn DataPlane>,
    statuses: RwLock<HashMap<String, ReplicationStatus>>,
    interval: Duration,
}

impl ReplicationMonitor {
    pub fn new(data_plane: Arc<dyn DataPlane>, interval: Duration) -> Self {
        Self {
            data_plane,
            statuses: RwLock::new(HashMap::new()),
            interval,
        }
    }

    /// One monitoring pass. A data-plane failure aborts the pass and leaves
    /// the previous cache in place.
    pub async fn check_once(&self) -> Result<(), coral_search::SearchError> {
        let shards = self.data_plane.shard_allocation().await?;
        let statuses = aggregate_replication(&shards, epoch_secs());

        let (healthy, total) = (
            statuses
                .values()
                .filter(|s| s.health == ReplicationHealth::Healthy)
                .count(),
            statuses.len(),
        );
        debug!(healthy, total, "replication pass complete");

        for status in statuses.values() {
            if status.health != ReplicationHealth::Healthy {
                warn!(
                    index = %status.index,
                    health = ?status.health,
                    progress = status.progress,
                    unreplicated = status.unreplicated_shards,
                    "index replication unhealthy"
                );
            }
        }

        *self.statuses.write().await = statuses;
        Ok(())
    }

    /// Run the monitoring loop until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "replication monitor started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.check_once().await {
                        tracing::error!(error = %e, "replication check failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("replication monitor shutting down");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ReplicationReader for ReplicationMonitor {
    async fn replication_status(&self, index: &str) -> Option<ReplicationStatus> {
        self.statuses.read().await.get(index).cloned()
    }

    async fn all_replication_statuses(&self) -> HashMap<String, ReplicationStatus> {
        self.statuses.read().await.clone()
    }
}

/// Aggregate a shard listing into per-index replication status.
///
/// Shard copies in the started state count as replicated. Any initializing
/// copy marks the index syncing and any unassigned copy marks it degraded;
/// the final verdict then depends on overall progress: below 50% with
/// unreplicated copies is a failure, below 100% is still syncing.
pub fn aggregate_replication(
    shards: &[ShardInfo],
    now: u64,
) -> HashMap<String, ReplicationStatus> {
    let mut statuses: HashMap<String, ReplicationStatus> = HashMap::new();

    for shard in shards {
        let status = statuses
            .entry(shard.index.clone())
            .or_insert_with(|| ReplicationStatus {
                index: shard.index.clone(),
                total_shards: 0,
                replicated_shards: 0,
                unreplicated_shards: 0,
                progress: 0.0,
                health: ReplicationHealth::Healthy,
                last_check: now,
            });

        status.total_shards += 1;
        if shard.state == ShardState::Started {
            status.replicated_shards += 1;
        } else {
            status.unreplicated_shards += 1;
            match shard.state {
                ShardState::Initializing => status.health = ReplicationHealth::Syncing,
                ShardState::Unassigned => status.health = ReplicationHealth::Degraded,
                _ => {}
            }
        }
    }

    for status in statuses.values_mut() {
        if status.total_shards > 0 {
            status.progress =
                status.replicated_shards as f64 / status.total_shards as f64 * 100.0;
        }
        if status.unreplicated_shards > 0 {
            if status.progress < 50.0 {
                status.health = ReplicationHealth::Failed;
            } else if status.progress < 100.0 {
                status.health = ReplicationHealth::Syncing;
            }
        }
    }

    statuses
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
