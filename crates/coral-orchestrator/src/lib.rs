//! coral-orchestrator — the container orchestrator contract.
//!
//! The control plane never schedules containers itself; it reads replica
//! counts, readiness, and pod resource usage from the orchestrator and nudges
//! it through a narrow interface. `Orchestrator` is that interface;
//! `KubectlOrchestrator` is the production implementation shelling out to
//! `kubectl`.

pub mod kubectl;

use async_trait::async_trait;
use thiserror::Error;

pub use kubectl::KubectlOrchestrator;

/// Result type alias for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Errors from orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("unexpected output: {0}")]
    Parse(String),
}

/// Narrow view of the container orchestrator.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Namespaces carrying a tenant search cluster (label selection).
    async fn cluster_namespaces(&self) -> OrchestratorResult<Vec<String>>;

    /// Declared replica count of the cluster statefulset in a namespace.
    async fn current_replicas(&self, namespace: &str) -> OrchestratorResult<i32>;

    /// Set the replica count of the cluster statefulset in a namespace.
    async fn set_replicas(&self, namespace: &str, replicas: i32) -> OrchestratorResult<()>;

    /// Readiness overlay string, `"{ready}/{spec}"`.
    async fn readiness(&self, namespace: &str) -> OrchestratorResult<String>;

    /// Pod CPU (cores) and memory (MB) usage for a namespace.
    async fn pod_usage(&self, namespace: &str) -> OrchestratorResult<(f64, f64)>;

    /// Data-volume disk usage percentage for a namespace.
    async fn disk_usage_percent(&self, namespace: &str) -> OrchestratorResult<f64>;
}
