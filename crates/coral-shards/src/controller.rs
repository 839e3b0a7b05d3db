//! Shard controller — rebalance decisions and progress monitoring.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use coral_search::{ClusterStats, DataPlane, SearchResult};

/// Rebalance when the cluster averages more than this many shards per node.
const REBALANCE_THRESHOLD: f64 = 5.0;

/// Progress monitor poll cadence.
const MONITOR_POLL: Duration = Duration::from_secs(5);

/// Hard ceiling on progress monitoring.
const MONITOR_CEILING: Duration = Duration::from_secs(30 * 60);

/// Periodically assesses shard distribution and triggers rebalancing.
pub struct ShardController {
    data_plane: Arc<dyn DataPlane>,
    interval: Duration,
    monitor_poll: Duration,
    monitor_ceiling: Duration,
}

impl ShardController {
    pub fn new(data_plane: Arc<dyn DataPlane>, interval: Duration) -> Self {
        Self {
            data_plane,
            interval,
            monitor_poll: MONITOR_POLL,
            monitor_ceiling: MONITOR_CEILING,
        }
    }

    /// Override monitor timing (tests).
    pub fn with_monitor_timing(mut self, poll: Duration, ceiling: Duration) -> Self {
        self.monitor_poll = poll;
        self.monitor_ceiling = ceiling;
        self
    }

    /// One management pass: rebalance on imbalance, optimize on hot shards.
    pub async fn manage_once(&self) -> SearchResult<()> {
        let stats = self.data_plane.cluster_stats().await?;

        if should_rebalance(&stats) {
            info!(
                nodes = stats.node_count,
                shards = stats.total_shards,
                average = stats.average_shards_per_node(),
                "shard distribution over threshold, rebalancing"
            );
            self.rebalance().await?;
        }

        if has_hot_shards(&stats) {
            self.optimize_allocation().await?;
        }

        Ok(())
    }

    /// Enable rebalancing on the engine and spawn a progress monitor.
    pub async fn rebalance(&self) -> SearchResult<()> {
        let settings = json!({
            "transient": {
                "cluster.routing.rebalance.enable": "all",
                "cluster.routing.allocation.node_concurrent_recoveries": 2,
                "indices.recovery.max_bytes_per_sec": "50mb"
            }
        });
        self.data_plane.update_cluster_settings(settings).await?;
        info!("shard rebalancing triggered");

        let data_plane = self.data_plane.clone();
        let poll = self.monitor_poll;
        let ceiling = self.monitor_ceiling;
        tokio::spawn(async move {
            monitor_rebalance(data_plane, poll, ceiling).await;
        });

        Ok(())
    }

    /// Push tuned balance weights to the engine.
    ///
    /// Exposed for manual invocation; the automatic path never reaches it
    /// while hot-shard detection has no telemetry behind it.
    pub async fn optimize_allocation(&self) -> SearchResult<()> {
        let settings = json!({
            "transient": {
                "cluster.routing.allocation.balance.shard": 0.45,
                "cluster.routing.allocation.balance.index": 0.55,
                "cluster.routing.allocation.balance.threshold": 1.0
            }
        });
        self.data_plane.update_cluster_settings(settings).await?;
        info!("shard allocation balance weights updated");
        Ok(())
    }

    /// Run the management loop until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "shard controller started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.manage_once().await {
                        tracing::error!(error = %e, "shard management pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("shard controller shutting down");
                    break;
                }
            }
        }
    }
}

/// Distribution heuristic: average shards per node above the threshold.
fn should_rebalance(stats: &ClusterStats) -> bool {
    stats.average_shards_per_node() > REBALANCE_THRESHOLD
}

/// Hot-shard detection. No per-shard query telemetry is wired up yet, so
/// this never fires and the optimize path stays manual.
fn has_hot_shards(_stats: &ClusterStats) -> bool {
    false
}

/// Follow active recoveries until the engine reports none, or the ceiling
/// expires.
async fn monitor_rebalance(data_plane: Arc<dyn DataPlane>, poll: Duration, ceiling: Duration) {
    let deadline = tokio::time::Instant::now() + ceiling;

    loop {
        tokio::time::sleep(poll).await;
        if tokio::time::Instant::now() >= deadline {
            warn!("rebalance monitoring ceiling reached, giving up");
            return;
        }

        let recoveries = match data_plane.recovery_status().await {
            Ok(recoveries) => recoveries,
            Err(e) => {
                warn!(error = %e, "recovery status poll failed");
                continue;
            }
        };

        if recoveries.is_empty() {
            info!("rebalancing complete, no active recoveries");
            return;
        }

        let mut total = 0;
        for (index, shards) in &recoveries {
            for recovery in shards {
                debug!(
                    %index,
                    shard = recovery.shard,
                    percent = %recovery.percent,
                    stage = %recovery.stage,
                    source = %recovery.source_node,
                    target = %recovery.target_node,
                    "rebalance progress"
                );
                total += 1;
            }
        }
        info!(active = total, "rebalance recoveries in flight");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coral_search::{SearchError, ShardInfo, ShardRecovery};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Data plane stub with scripted stats and recorded settings pushes.
    struct StubDataPlane {
        stats: ClusterStats,
        settings: Mutex<Vec<serde_json::Value>>,
        /// Successive recovery_status answers; the last repeats.
        recoveries: Mutex<Vec<HashMap<String, Vec<ShardRecovery>>>>,
    }

    impl StubDataPlane {
        fn with_stats(node_count: u64, total_shards: u64) -> Arc<Self> {
            Arc::new(Self {
                stats: ClusterStats {
                    node_count,
                    total_shards,
                },
                settings: Mutex::new(Vec::new()),
                recoveries: Mutex::new(vec![HashMap::new()]),
            })
        }

        fn settings(&self) -> Vec<serde_json::Value> {
            self.settings.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DataPlane for StubDataPlane {
        async fn shard_allocation(&self) -> SearchResult<Vec<ShardInfo>> {
            Ok(Vec::new())
        }

        async fn update_cluster_settings(&self, settings: serde_json::Value) -> SearchResult<()> {
            self.settings.lock().unwrap().push(settings);
            Ok(())
        }

        async fn recovery_status(
            &self,
        ) -> SearchResult<HashMap<String, Vec<ShardRecovery>>> {
            let mut scripted = self.recoveries.lock().unwrap();
            if scripted.len() > 1 {
                Ok(scripted.remove(0))
            } else {
                scripted
                    .first()
                    .cloned()
                    .ok_or_else(|| SearchError::Api {
                        status: 503,
                        body: "no script".to_string(),
                    })
            }
        }

        async fn cluster_stats(&self) -> SearchResult<ClusterStats> {
            Ok(self.stats)
        }
    }

    fn recovery(index: &str) -> HashMap<String, Vec<ShardRecovery>> {
        let mut map = HashMap::new();
        map.insert(
            index.to_string(),
            vec![ShardRecovery {
                index: index.to_string(),
                shard: 0,
                kind: "PEER".to_string(),
                stage: "index".to_string(),
                source_node: "node-1".to_string(),
                target_node: "node-2".to_string(),
                bytes_recovered: 10,
                bytes_total: 100,
                percent: "10.0%".to_string(),
            }],
        );
        map
    }

    #[test]
    fn rebalance_heuristic_is_strictly_above_five() {
        let over = ClusterStats {
            node_count: 2,
            total_shards: 11,
        };
        let at = ClusterStats {
            node_count: 2,
            total_shards: 10,
        };
        assert!(should_rebalance(&over));
        assert!(!should_rebalance(&at));
    }

    #[test]
    fn hot_shard_detection_is_disabled() {
        let stats = ClusterStats {
            node_count: 1,
            total_shards: 100,
        };
        assert!(!has_hot_shards(&stats));
    }

    #[tokio::test]
    async fn balanced_cluster_pushes_no_settings() {
        let data_plane = StubDataPlane::with_stats(3, 9);
        let controller = ShardController::new(data_plane.clone(), Duration::from_secs(30));

        controller.manage_once().await.unwrap();
        assert!(data_plane.settings().is_empty());
    }

    #[tokio::test]
    async fn imbalanced_cluster_triggers_rebalance_settings() {
        let data_plane = StubDataPlane::with_stats(2, 20);
        let controller = ShardController::new(data_plane.clone(), Duration::from_secs(30))
            .with_monitor_timing(Duration::from_millis(5), Duration::from_millis(100));

        controller.manage_once().await.unwrap();

        let pushed = data_plane.settings();
        assert_eq!(pushed.len(), 1);
        let transient = &pushed[0]["transient"];
        assert_eq!(transient["cluster.routing.rebalance.enable"], "all");
        assert_eq!(
            transient["cluster.routing.allocation.node_concurrent_recoveries"],
            2
        );
        assert_eq!(transient["indices.recovery.max_bytes_per_sec"], "50mb");
    }

    #[tokio::test]
    async fn optimize_pushes_balance_weights() {
        let data_plane = StubDataPlane::with_stats(3, 3);
        let controller = ShardController::new(data_plane.clone(), Duration::from_secs(30));

        controller.optimize_allocation().await.unwrap();

        let pushed = data_plane.settings();
        let transient = &pushed[0]["transient"];
        assert_eq!(transient["cluster.routing.allocation.balance.shard"], 0.45);
        assert_eq!(transient["cluster.routing.allocation.balance.index"], 0.55);
        assert_eq!(transient["cluster.routing.allocation.balance.threshold"], 1.0);
    }

    #[tokio::test]
    async fn monitor_exits_when_recoveries_drain() {
        let data_plane = StubDataPlane::with_stats(1, 1);
        // One poll with work, then the drain signal.
        *data_plane.recoveries.lock().unwrap() = vec![recovery("idx1"), HashMap::new()];

        // Returns promptly rather than running to the ceiling.
        tokio::time::timeout(
            Duration::from_secs(2),
            monitor_rebalance(
                data_plane.clone(),
                Duration::from_millis(5),
                Duration::from_secs(60),
            ),
        )
        .await
        .expect("monitor should exit once recoveries drain");
    }

    #[tokio::test]
    async fn monitor_stops_at_ceiling() {
        let data_plane = StubDataPlane::with_stats(1, 1);
        // Recoveries never drain.
        *data_plane.recoveries.lock().unwrap() = vec![recovery("idx1")];

        tokio::time::timeout(
            Duration::from_secs(2),
            monitor_rebalance(
                data_plane.clone(),
                Duration::from_millis(5),
                Duration::from_millis(30),
            ),
        )
        .await
        .expect("monitor should stop at its ceiling");
    }
}
