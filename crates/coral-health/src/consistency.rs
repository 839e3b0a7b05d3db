//! Consistency checker — compares primary and replica shard statistics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use coral_search::{DataPlane, ShardInfo, ShardState};

use crate::types::{ConsistencyReport, ConsistencyStatus, ShardConsistencyReport};
use crate::HealthError;

/// Default allowed difference between primary and replica document counts.
pub const DEFAULT_DOC_COUNT_TOLERANCE: i64 = 10;

/// Read-and-probe capability over the consistency cache.
#[async_trait]
pub trait ConsistencyReader: Send + Sync {
    /// Cached report for one index.
    async fn consistency_report(&self, index: &str) -> Option<ConsistencyReport>;

    /// Cached reports for every index.
    async fn all_consistency_reports(&self) -> HashMap<String, ConsistencyReport>;

    /// Check one index right now, updating the cache on completion.
    async fn check_index_now(&self, index: &str) -> Result<ConsistencyReport, HealthError>;
}

/// Periodically cross-checks every index; exposes synchronous re-checks.
pub struct ConsistencyChecker {
    data_plane: Arc<dyn DataPlane>,
    reports: RwLock<HashMap<String, ConsistencyReport>>,
    doc_count_tolerance: i64,
    interval: Duration,
}

impl ConsistencyChecker {
    pub fn new(data_plane: Arc<dyn DataPlane>, interval: Duration) -> Self {
        Self {
            data_plane,
            reports: RwLock::new(HashMap::new()),
            doc_count_tolerance: DEFAULT_DOC_COUNT_TOLERANCE,
            interval,
        }
    }

    /// Override the document-count tolerance.
    pub fn with_doc_count_tolerance(mut self, tolerance: i64) -> Self {
        self.doc_count_tolerance = tolerance;
        self
    }

    /// One checking pass over every index in the cluster.
    pub async fn check_all_once(&self) -> Result<(), coral_search::SearchError> {
        let shards = self.data_plane.shard_allocation().await?;

        let mut by_index: HashMap<String, Vec<ShardInfo>> = HashMap::new();
        for shard in shards {
            by_index.entry(shard.index.clone()).or_default().push(shard);
        }

        let now = epoch_secs();
        let mut reports = HashMap::new();
        for (index, shards) in by_index {
            let report = check_index(&index, &shards, self.doc_count_tolerance, now);
            if report.status != ConsistencyStatus::Consistent {
                warn!(
                    %index,
                    status = ?report.status,
                    inconsistent = report.inconsistent_shards,
                    total = report.total_shards,
                    "index consistency degraded"
                );
            }
            reports.insert(index, report);
        }

        debug!(indices = reports.len(), "consistency pass complete");
        *self.reports.write().await = reports;
        Ok(())
    }

    /// Run the checking loop until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "consistency checker started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.check_all_once().await {
                        tracing::error!(error = %e, "consistency check failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("consistency checker shutting down");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ConsistencyReader for ConsistencyChecker {
    async fn consistency_report(&self, index: &str) -> Option<ConsistencyReport> {
        self.reports.read().await.get(index).cloned()
    }

    async fn all_consistency_reports(&self) -> HashMap<String, ConsistencyReport> {
        self.reports.read().await.clone()
    }

    async fn check_index_now(&self, index: &str) -> Result<ConsistencyReport, HealthError> {
        debug!(%index, "immediate consistency check");

        let shards = self.data_plane.shard_allocation().await?;
        let index_shards: Vec<ShardInfo> =
            shards.into_iter().filter(|s| s.index == index).collect();
        if index_shards.is_empty() {
            return Err(HealthError::NoShards(index.to_string()));
        }

        let report = check_index(index, &index_shards, self.doc_count_tolerance, epoch_secs());
        self.reports
            .write()
            .await
            .insert(index.to_string(), report.clone());
        Ok(report)
    }
}

/// Check one index's shard groups for primary/replica divergence.
pub fn check_index(
    index: &str,
    shards: &[ShardInfo],
    tolerance: i64,
    now: u64,
) -> ConsistencyReport {
    let mut groups: HashMap<&str, Vec<&ShardInfo>> = HashMap::new();
    for shard in shards {
        groups.entry(shard.shard.as_str()).or_default().push(shard);
    }

    let mut report = ConsistencyReport {
        index: index.to_string(),
        status: ConsistencyStatus::Checking,
        total_shards: groups.len(),
        consistent_shards: 0,
        inconsistent_shards: 0,
        shard_reports: Vec::new(),
        issues: Vec::new(),
        check_time: now,
    };

    for (shard_id, group) in &groups {
        let shard_report = check_shard_group(index, shard_id, group, tolerance);
        if shard_report.is_consistent {
            report.consistent_shards += 1;
        } else {
            report.inconsistent_shards += 1;
            report.issues.extend(shard_report.issues.iter().cloned());
        }
        report.shard_reports.push(shard_report);
    }
    report.shard_reports.sort_by_key(|r| r.shard_id);

    report.status = if report.inconsistent_shards == 0 {
        ConsistencyStatus::Consistent
    } else if report.inconsistent_shards < report.total_shards / 2 {
        ConsistencyStatus::Inconsistent
    } else {
        ConsistencyStatus::Error
    };

    report
}

/// Compare one shard group (primary + replicas).
fn check_shard_group(
    index: &str,
    shard_id: &str,
    group: &[&ShardInfo],
    tolerance: i64,
) -> ShardConsistencyReport {
    let mut report = ShardConsistencyReport {
        shard_id: shard_id.parse().unwrap_or(0),
        primary_node: String::new(),
        replica_nodes: Vec::new(),
        primary_doc_count: 0,
        replica_doc_counts: Vec::new(),
        primary_store_size: String::new(),
        replica_store_sizes: Vec::new(),
        is_consistent: true,
        issues: Vec::new(),
    };

    let primary = group.iter().find(|s| s.is_primary());
    let replicas: Vec<&&ShardInfo> = group.iter().filter(|s| !s.is_primary()).collect();

    let Some(primary) = primary else {
        report.is_consistent = false;
        report
            .issues
            .push(format!("no primary shard found for shard {shard_id}"));
        return report;
    };

    report.primary_node = primary.node_name().to_string();
    report.primary_store_size = primary.store_size().to_string();
    report.primary_doc_count = primary.doc_count();

    for replica in &replicas {
        report.replica_nodes.push(replica.node_name().to_string());
        report.replica_store_sizes.push(replica.store_size().to_string());
        let replica_docs = replica.doc_count();
        report.replica_doc_counts.push(replica_docs);

        if replica.state != ShardState::Started {
            report.is_consistent = false;
            report.issues.push(format!(
                "replica on {} is not started (state: {:?})",
                replica.node_name(),
                replica.state
            ));
            continue;
        }

        let diff = (report.primary_doc_count - replica_docs).abs();
        if diff > tolerance {
            report.is_consistent = false;
            report.issues.push(format!(
                "doc count mismatch: primary={}, replica on {}={} (diff={})",
                report.primary_doc_count,
                replica.node_name(),
                replica_docs,
                diff
            ));
        }

        // Store sizes drift during merges; a mismatch is worth a log line
        // but not an inconsistency verdict.
        if primary.store_size() != replica.store_size() {
            warn!(
                %index,
                shard = shard_id,
                primary = primary.store_size(),
                replica = replica.store_size(),
                "store size mismatch"
            );
        }
    }

    if replicas.is_empty() {
        // Zero replicas may simply be the configured replica count.
        report
            .issues
            .push(format!("no replica shards found for shard {shard_id}"));
    }

    report
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
