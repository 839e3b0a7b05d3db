//! Autoscaler — the scaling decision loop.
//!
//! Each tick walks every known deployment, refreshes its trend window from
//! the store's latest snapshot, and decides a new replica count. Decisions
//! pass through four gates in order: policy enablement, no-op equality,
//! direction-specific cool-down, and (for scale-up) tenant quota.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use coral_meta::{MetaStore, MetricSnapshot, Phase};
use coral_orchestrator::Orchestrator;

use crate::config::{AutoscalerConfig, ScalingPolicy};
use crate::window::{HistoricalWindow, Trend};

/// The autoscaler evaluates metrics and drives replica counts through the
/// orchestrator.
pub struct Autoscaler {
    store: MetaStore,
    orchestrator: Arc<dyn Orchestrator>,
    config: AutoscalerConfig,
    /// Per-user scaling policies.
    policies: RwLock<HashMap<String, ScalingPolicy>>,
    /// Per-namespace trend windows.
    windows: RwLock<HashMap<String, HistoricalWindow>>,
    /// Per-namespace last scaling action, epoch seconds.
    last_scaling: RwLock<HashMap<String, u64>>,
    interval: Duration,
}

impl Autoscaler {
    pub fn new(
        store: MetaStore,
        orchestrator: Arc<dyn Orchestrator>,
        config: AutoscalerConfig,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            orchestrator,
            config,
            policies: RwLock::new(HashMap::new()),
            windows: RwLock::new(HashMap::new()),
            last_scaling: RwLock::new(HashMap::new()),
            interval,
        }
    }

    pub fn config(&self) -> &AutoscalerConfig {
        &self.config
    }

    // ── Policy management ─────────────────────────────────────────

    /// Install or replace a user's scaling policy.
    pub async fn set_policy(&self, policy: ScalingPolicy) {
        let mut policies = self.policies.write().await;
        policies.insert(policy.user_id.clone(), policy);
    }

    /// The explicit policy for a user, if one was installed.
    pub async fn policy(&self, user_id: &str) -> Option<ScalingPolicy> {
        self.policies.read().await.get(user_id).cloned()
    }

    /// Remove a user's policy. Returns true if one existed.
    pub async fn remove_policy(&self, user_id: &str) -> bool {
        self.policies.write().await.remove(user_id).is_some()
    }

    /// All installed policies.
    pub async fn list_policies(&self) -> Vec<ScalingPolicy> {
        self.policies.read().await.values().cloned().collect()
    }

    /// The policy in effect for a user: the installed one, or defaults.
    pub async fn effective_policy(&self, user_id: &str) -> ScalingPolicy {
        if !user_id.is_empty() {
            if let Some(policy) = self.policies.read().await.get(user_id) {
                return policy.clone();
            }
        }
        self.config.default_policy(user_id)
    }

    // ── Tick ──────────────────────────────────────────────────────

    /// One full evaluation pass over every known deployment.
    pub async fn check_and_scale(&self) -> anyhow::Result<()> {
        let deployments = self.store.list_deployment_status()?;

        for deployment in &deployments {
            // Deleted tenants keep their status record for audit; their
            // snapshots must not drive scaling.
            match self
                .store
                .get_tenant_container(&deployment.user, &deployment.service_name)
            {
                Ok(Some(container)) if container.deleted => continue,
                Ok(_) => {}
                Err(e) => {
                    warn!(namespace = %deployment.namespace, error = %e, "container lookup failed");
                    continue;
                }
            }

            if let Err(e) = self
                .scale_namespace(&deployment.namespace, &deployment.user)
                .await
            {
                warn!(namespace = %deployment.namespace, error = %e, "scaling evaluation failed");
            }
        }

        Ok(())
    }

    /// Evaluate and (maybe) scale a single namespace.
    pub async fn scale_namespace(&self, namespace: &str, user_id: &str) -> anyhow::Result<()> {
        let current = self.orchestrator.current_replicas(namespace).await?;

        let Some(metrics) = self.store.latest_metrics(namespace)? else {
            debug!(%namespace, "no metrics yet");
            return Ok(());
        };

        // The window is fed on every tick, before any gate, so the trend
        // stays warm through cool-downs and disabled policies.
        let trend = {
            let mut windows = self.windows.write().await;
            let window = windows.entry(namespace.to_string()).or_default();
            window.push(metrics.clone());
            window.trend()
        };
        debug!(
            %namespace,
            cpu_trend = trend.cpu,
            memory_trend = trend.memory,
            disk_trend = trend.disk,
            qps_trend = trend.qps,
            "trend analysis"
        );

        let policy = self.effective_policy(user_id).await;
        if !policy.enable_scale_up && !policy.enable_scale_down {
            debug!(%namespace, user_id, "auto-scaling disabled by policy");
            return Ok(());
        }

        let adjusted = adjust_for_trend(&metrics, &trend);
        let target = self.calculate_target(current, &adjusted, &policy);
        if target == current {
            return Ok(());
        }
        let target = target.clamp(policy.min_replicas, policy.max_replicas);

        if self.in_cooldown(namespace, current, target).await {
            info!(%namespace, "skipping scaling: cool-down in effect");
            return Ok(());
        }

        // Quota gates scale-up only, and only when the tenant is known.
        if target > current && !user_id.is_empty() {
            match self.store.check_tenant_quota(user_id) {
                Ok((true, _)) => {}
                Ok((false, quota)) => {
                    info!(
                        %namespace,
                        user_id,
                        max_indices = quota.max_indices,
                        current_indices = quota.current_indices,
                        "skipping scale-up: tenant quota exceeded"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(%namespace, user_id, error = %e, "quota check failed");
                }
            }
        }

        self.orchestrator.set_replicas(namespace, target).await?;
        info!(%namespace, from = current, to = target, "cluster scaled");

        self.last_scaling
            .write()
            .await
            .insert(namespace.to_string(), epoch_secs());

        if let Some(mut status) = self.store.get_deployment_status(namespace)? {
            status.replicas = target;
            status.phase = Phase::Scaling;
            status.updated_at = epoch_secs();
            self.store.put_deployment_status(&status)?;
        }

        Ok(())
    }

    /// Raw target from the decision rule, before policy clamping.
    ///
    /// Scale-up wins when both directions somehow match.
    fn calculate_target(
        &self,
        current: i32,
        metrics: &MetricSnapshot,
        policy: &ScalingPolicy,
    ) -> i32 {
        if policy.enable_scale_up && should_scale_up(metrics, policy) {
            let mut target = (current as f64 * self.config.scale_up_factor) as i32;
            if target <= current {
                target = current + 1;
            }
            return target.min(self.config.max_replicas);
        }

        if policy.enable_scale_down && should_scale_down(metrics, policy) {
            let mut target = (current as f64 * self.config.scale_down_factor) as i32;
            if target >= current {
                target = current - 1;
            }
            return target.max(self.config.min_replicas);
        }

        current
    }

    /// Whether the namespace is still in its direction-specific dead-time.
    async fn in_cooldown(&self, namespace: &str, current: i32, target: i32) -> bool {
        let Some(last) = self.last_scaling.read().await.get(namespace).copied() else {
            return false;
        };
        let cooldown = if target > current {
            self.config.scale_up_cooldown
        } else {
            self.config.scale_down_cooldown
        };
        epoch_secs().saturating_sub(last) < cooldown.as_secs()
    }

    /// Backdate a namespace's last scaling action (tests, manual overrides).
    pub async fn mark_scaled_at(&self, namespace: &str, epoch: u64) {
        self.last_scaling
            .write()
            .await
            .insert(namespace.to_string(), epoch);
    }

    /// Run the autoscaler loop until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "autoscaler started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.check_and_scale().await {
                        tracing::error!(error = %e, "autoscaler tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }
    }
}

/// Bias a sample by its trend: rising channels count 10% heavier, falling
/// channels 10% lighter, so scale-up comes sooner on a climb and scale-down
/// later on a descent.
fn adjust_for_trend(metrics: &MetricSnapshot, trend: &Trend) -> MetricSnapshot {
    let mut adjusted = metrics.clone();

    adjusted.cpu_usage *= bias(trend.cpu, 0.5);
    adjusted.memory_usage *= bias(trend.memory, 0.5);
    adjusted.disk_usage *= bias(trend.disk, 0.5);
    adjusted.qps *= bias(trend.qps, 10.0);

    adjusted
}

fn bias(trend: f64, threshold: f64) -> f64 {
    if trend > threshold {
        1.1
    } else if trend < -threshold {
        0.9
    } else {
        1.0
    }
}

/// Any channel above the up-threshold triggers scale-up.
fn should_scale_up(metrics: &MetricSnapshot, policy: &ScalingPolicy) -> bool {
    metrics.cpu_usage > policy.scale_up_threshold
        || metrics.memory_usage > policy.scale_up_threshold
        || metrics.disk_usage > policy.scale_up_threshold
        || metrics.qps > policy.scale_up_threshold
}

/// Every channel below the down-threshold triggers scale-down.
fn should_scale_down(metrics: &MetricSnapshot, policy: &ScalingPolicy) -> bool {
    metrics.cpu_usage < policy.scale_down_threshold
        && metrics.memory_usage < policy.scale_down_threshold
        && metrics.disk_usage < policy.scale_down_threshold
        && metrics.qps < policy.scale_down_threshold
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
