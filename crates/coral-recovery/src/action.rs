//! Recovery action records and their state machine vocabulary.

use serde::{Deserialize, Serialize};

/// What a recovery action does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryKind {
    /// Re-enable allocation so unassigned shards find a node.
    Reallocate,
    /// Raise recovery throughput and wait for replicas to converge.
    Resync,
    /// Push balancing weights and let the engine move shards.
    Rebalance,
    /// Post-recovery check: replication healthy and replicas consistent.
    Verify,
}

impl RecoveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryKind::Reallocate => "reallocate",
            RecoveryKind::Resync => "resync",
            RecoveryKind::Rebalance => "rebalance",
            RecoveryKind::Verify => "verify",
        }
    }
}

/// Where an action is in its lifecycle.
///
/// `Pending → Running → (Success | Retrying | Failed)`, and
/// `Retrying → Running` on the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPhase {
    Pending,
    Running,
    Success,
    Failed,
    Retrying,
}

/// One recovery attempt series against a single index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAction {
    pub id: String,
    pub index: String,
    pub kind: RecoveryKind,
    pub phase: RecoveryPhase,
    pub attempts: u32,
    pub max_retries: u32,
    /// Unix timestamp (seconds) when the action was triggered.
    pub started_at: u64,
    /// Unix timestamp (seconds) when the action reached a terminal phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<u64>,
    pub description: String,
    /// Last attempt's error, kept even after a later attempt succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecoveryAction {
    /// Whether this action holds the per-index exclusivity slot.
    pub fn is_active(&self) -> bool {
        matches!(
            self.phase,
            RecoveryPhase::Pending | RecoveryPhase::Running | RecoveryPhase::Retrying
        )
    }
}
