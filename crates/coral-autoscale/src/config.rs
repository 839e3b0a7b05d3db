//! Autoscaler configuration and per-user scaling policies.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Global autoscaler knobs. Thresholds are percentages except the QPS pair.
#[derive(Debug, Clone)]
pub struct AutoscalerConfig {
    pub high_cpu_threshold: f64,
    pub low_cpu_threshold: f64,
    pub high_memory_threshold: f64,
    pub low_memory_threshold: f64,
    pub high_qps_threshold: f64,
    pub low_qps_threshold: f64,
    pub high_disk_threshold: f64,
    pub low_disk_threshold: f64,
    /// Replica multiplier on scale-up.
    pub scale_up_factor: f64,
    /// Replica multiplier on scale-down.
    pub scale_down_factor: f64,
    pub min_replicas: i32,
    pub max_replicas: i32,
    /// Dead-time after a scale-up before the next action on a namespace.
    pub scale_up_cooldown: Duration,
    /// Dead-time after a scale-down.
    pub scale_down_cooldown: Duration,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            high_cpu_threshold: 70.0,
            low_cpu_threshold: 30.0,
            high_memory_threshold: 70.0,
            low_memory_threshold: 30.0,
            high_qps_threshold: 2000.0,
            low_qps_threshold: 500.0,
            high_disk_threshold: 80.0,
            low_disk_threshold: 20.0,
            scale_up_factor: 1.5,
            scale_down_factor: 0.5,
            min_replicas: 1,
            max_replicas: 10,
            scale_up_cooldown: Duration::from_secs(300),
            scale_down_cooldown: Duration::from_secs(600),
        }
    }
}

/// Per-user overrides for scaling behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub user_id: String,
    pub enable_scale_up: bool,
    pub enable_scale_down: bool,
    /// Any adjusted channel above this triggers scale-up.
    pub scale_up_threshold: f64,
    /// All adjusted channels below this trigger scale-down.
    pub scale_down_threshold: f64,
    pub max_replicas: i32,
    pub min_replicas: i32,
}

impl AutoscalerConfig {
    /// The defaults-filled policy for a user without an explicit one.
    pub fn default_policy(&self, user_id: &str) -> ScalingPolicy {
        ScalingPolicy {
            user_id: user_id.to_string(),
            enable_scale_up: true,
            enable_scale_down: true,
            scale_up_threshold: self.high_cpu_threshold,
            scale_down_threshold: self.low_cpu_threshold,
            max_replicas: self.max_replicas,
            min_replicas: self.min_replicas,
        }
    }
}
