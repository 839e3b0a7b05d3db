//! Metric collector — samples tenant namespaces and persists snapshots.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use coral_meta::{MetaStore, MetricSnapshot, Phase};
use coral_orchestrator::Orchestrator;

/// Source of query-rate telemetry for a namespace.
///
/// The engine-side rate and the vector-plugin rate come from outside the
/// orchestrator; implementations may poll the engine or a metrics pipeline.
#[async_trait]
pub trait QueryRateSource: Send + Sync {
    /// Engine query rate (requests per second).
    async fn query_rate(&self, namespace: &str) -> f64;

    /// Vector-plugin query rate; sampled for logging, not persisted.
    async fn plugin_query_rate(&self, _namespace: &str) -> f64 {
        0.0
    }
}

/// Fixed-rate source, used until a real telemetry pipeline is wired in.
pub struct StaticQueryRate(pub f64);

#[async_trait]
impl QueryRateSource for StaticQueryRate {
    async fn query_rate(&self, _namespace: &str) -> f64 {
        self.0
    }
}

/// Collects per-namespace usage on a fixed cadence.
pub struct MetricCollector {
    store: MetaStore,
    orchestrator: Arc<dyn Orchestrator>,
    query_rates: Arc<dyn QueryRateSource>,
    interval: Duration,
}

impl MetricCollector {
    pub fn new(
        store: MetaStore,
        orchestrator: Arc<dyn Orchestrator>,
        query_rates: Arc<dyn QueryRateSource>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            orchestrator,
            query_rates,
            interval,
        }
    }

    /// One collection pass over every tenant namespace.
    ///
    /// Returns the number of namespaces that produced a snapshot. Failures
    /// are confined to their namespace; the pass continues.
    pub async fn collect_once(&self) -> anyhow::Result<usize> {
        let namespaces = self.orchestrator.cluster_namespaces().await?;
        let mut collected = 0;

        for namespace in &namespaces {
            match self.collect_namespace(namespace).await {
                Ok(()) => collected += 1,
                Err(e) => {
                    warn!(%namespace, error = %e, "metric collection failed for namespace");
                }
            }
        }

        debug!(collected, total = namespaces.len(), "metric collection pass done");
        Ok(collected)
    }

    async fn collect_namespace(&self, namespace: &str) -> anyhow::Result<()> {
        let (cpu, memory) = self.orchestrator.pod_usage(namespace).await?;

        // A failed disk probe degrades to zero rather than dropping the sample.
        let disk = match self.orchestrator.disk_usage_percent(namespace).await {
            Ok(percent) => percent,
            Err(e) => {
                warn!(%namespace, error = %e, "disk usage probe failed");
                0.0
            }
        };

        let qps = self.query_rates.query_rate(namespace).await;
        let plugin_qps = self.query_rates.plugin_query_rate(namespace).await;

        let snapshot = MetricSnapshot {
            namespace: namespace.to_string(),
            cpu_usage: cpu,
            memory_usage: memory,
            disk_usage: disk,
            qps,
            timestamp: epoch_secs(),
        };
        self.store.save_metrics(&snapshot)?;
        debug!(%namespace, cpu, memory, disk, qps, plugin_qps, "metric snapshot persisted");

        // Fold the sample into the observed status; a namespace without a
        // status record is simply not tracked yet.
        let Some(mut status) = self.store.get_deployment_status(namespace)? else {
            return Ok(());
        };
        status.cpu_usage = cpu;
        status.memory_usage = memory;
        status.disk_usage = disk;
        status.qps = qps;
        status.phase = load_tier(cpu, memory);
        status.updated_at = snapshot.timestamp;
        self.store.put_deployment_status(&status)?;

        Ok(())
    }

    /// Run the collection loop until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "metric collector started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.collect_once().await {
                        tracing::error!(error = %e, "metric collection pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("metric collector shutting down");
                    break;
                }
            }
        }
    }
}

/// Map a usage sample to its load tier.
fn load_tier(cpu: f64, memory: f64) -> Phase {
    if cpu > 80.0 || memory > 80.0 {
        Phase::HighLoad
    } else if cpu < 20.0 && memory < 20.0 {
        Phase::LowLoad
    } else {
        Phase::Normal
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
    use coral_orchestrator::{OrchestratorError, OrchestratorResult};
    use std::collections::HashMap;

    /// Scripted orchestrator: fixed usage per namespace, optional failures.
    struct StubOrchestrator {
        usage: HashMap<String, (f64, f64)>,
        disk: f64,
        failing: Vec<String>,
    }

    impl StubOrchestrator {
        fn new(usage: &[(&str, f64, f64)]) -> Self {
            Self {
                usage: usage
                    .iter()
                    .map(|(ns, cpu, mem)| (ns.to_string(), (*cpu, *mem)))
                    .collect(),
                disk: 40.0,
                failing: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Orchestrator for StubOrchestrator {
        async fn cluster_namespaces(&self) -> OrchestratorResult<Vec<String>> {
            let mut names: Vec<String> = self.usage.keys().cloned().collect();
            names.extend(self.failing.clone());
            names.sort();
            Ok(names)
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

        async fn pod_usage(&self, namespace: &str) -> OrchestratorResult<(f64, f64)> {
            self.usage
                .get(namespace)
                .copied()
                .ok_or_else(|| OrchestratorError::Parse(format!("no pods in {namespace}")))
        }

        async fn disk_usage_percent(&self, _namespace: &str) -> OrchestratorResult<f64> {
            Ok(self.disk)
        }
    }

    fn test_status(namespace: &str) -> coral_meta::DeploymentStatus {
        coral_meta::DeploymentStatus {
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

    fn collector_with(
        store: &MetaStore,
        orchestrator: StubOrchestrator,
    ) -> MetricCollector {
        MetricCollector::new(
            store.clone(),
            Arc::new(orchestrator),
            Arc::new(StaticQueryRate(120.0)),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn load_tier_thresholds() {
        assert_eq!(load_tier(90.0, 50.0), Phase::HighLoad);
        assert_eq!(load_tier(50.0, 90.0), Phase::HighLoad);
        assert_eq!(load_tier(10.0, 10.0), Phase::LowLoad);
        // Only one channel low keeps the cluster in the normal tier.
        assert_eq!(load_tier(10.0, 50.0), Phase::Normal);
        assert_eq!(load_tier(50.0, 50.0), Phase::Normal);
    }

    #[tokio::test]
    async fn collect_persists_snapshot_and_tier() {
        let store = MetaStore::open_in_memory().unwrap();
        store.put_deployment_status(&test_status("acme-alice-search")).unwrap();

        let collector = collector_with(
            &store,
            StubOrchestrator::new(&[("acme-alice-search", 85.0, 40.0)]),
        );
        let collected = collector.collect_once().await.unwrap();
        assert_eq!(collected, 1);

        let snapshot = store.latest_metrics("acme-alice-search").unwrap().unwrap();
        assert_eq!(snapshot.cpu_usage, 85.0);
        assert_eq!(snapshot.qps, 120.0);

        let status = store.get_deployment_status("acme-alice-search").unwrap().unwrap();
        assert_eq!(status.phase, Phase::HighLoad);
        assert_eq!(status.cpu_usage, 85.0);
        assert_eq!(status.disk_usage, 40.0);
    }

    #[tokio::test]
    async fn namespace_without_status_still_gets_snapshot() {
        let store = MetaStore::open_in_memory().unwrap();

        let collector = collector_with(
            &store,
            StubOrchestrator::new(&[("acme-bob-search", 30.0, 30.0)]),
        );
        collector.collect_once().await.unwrap();

        assert!(store.latest_metrics("acme-bob-search").unwrap().is_some());
        assert!(store.get_deployment_status("acme-bob-search").unwrap().is_none());
    }

    #[tokio::test]
    async fn failures_are_isolated_per_namespace() {
        let store = MetaStore::open_in_memory().unwrap();

        let mut orchestrator = StubOrchestrator::new(&[("acme-ok-svc", 30.0, 30.0)]);
        orchestrator.failing.push("acme-broken-svc".to_string());

        let collector = collector_with(&store, orchestrator);
        let collected = collector.collect_once().await.unwrap();

        // The broken namespace is skipped; the healthy one still lands.
        assert_eq!(collected, 1);
        assert!(store.latest_metrics("acme-ok-svc").unwrap().is_some());
        assert!(store.latest_metrics("acme-broken-svc").unwrap().is_none());
    }

    #[tokio::test]
    async fn low_load_tier_applied() {
        let store = MetaStore::open_in_memory().unwrap();
        store.put_deployment_status(&test_status("acme-idle-svc")).unwrap();

        let collector =
            collector_with(&store, StubOrchestrator::new(&[("acme-idle-svc", 5.0, 10.0)]));
        collector.collect_once().await.unwrap();

        let status = store.get_deployment_status("acme-idle-svc").unwrap().unwrap();
        assert_eq!(status.phase, Phase::LowLoad);
    }
}
