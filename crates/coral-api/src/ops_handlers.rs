//! Replication, consistency, recovery, and shard-management handlers.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use coral_health::HealthError;

use crate::handlers::{error_response, ApiResponse};
use crate::ApiState;

// ── Replication ────────────────────────────────────────────────

/// GET /replication/status
pub async fn all_replication_statuses(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.replication.all_replication_statuses().await).into_response()
}

/// GET /replication/status/{index}
pub async fn replication_status(
    State(state): State<ApiState>,
    Path(index): Path<String>,
) -> impl IntoResponse {
    match state.replication.replication_status(&index).await {
        Some(status) => ApiResponse::ok(status).into_response(),
        None => error_response("no replication status for index", StatusCode::NOT_FOUND),
    }
}

// ── Consistency ────────────────────────────────────────────────

/// GET /consistency/reports
pub async fn all_consistency_reports(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.consistency.all_consistency_reports().await).into_response()
}

/// GET /consistency/reports/{index}
pub async fn consistency_report(
    State(state): State<ApiState>,
    Path(index): Path<String>,
) -> impl IntoResponse {
    match state.consistency.consistency_report(&index).await {
        Some(report) => ApiResponse::ok(report).into_response(),
        None => error_response("no consistency report for index", StatusCode::NOT_FOUND),
    }
}

/// POST /consistency/check/{index}
pub async fn check_consistency_now(
    State(state): State<ApiState>,
    Path(index): Path<String>,
) -> impl IntoResponse {
    match state.consistency.check_index_now(&index).await {
        Ok(report) => ApiResponse::ok(report).into_response(),
        Err(HealthError::NoShards(index)) => {
            error_response(&format!("no shards found for index: {index}"), StatusCode::NOT_FOUND)
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

// ── Recovery ───────────────────────────────────────────────────

/// GET /recovery/history
pub async fn recovery_history(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.recovery.history().await).into_response()
}

/// GET /recovery/active
pub async fn recovery_active(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.recovery.active().await).into_response()
}

/// Serialized view of the recovery knobs.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct RecoveryConfigView {
    pub enabled: bool,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub check_interval_secs: u64,
}

/// GET /recovery/config
pub async fn get_recovery_config(State(state): State<ApiState>) -> impl IntoResponse {
    let config = state.recovery.config().await;
    ApiResponse::ok(RecoveryConfigView {
        enabled: config.enabled,
        max_retries: config.max_retries,
        retry_delay_secs: config.retry_delay.as_secs(),
        check_interval_secs: config.check_interval.as_secs(),
    })
    .into_response()
}

/// Body of `POST /recovery/config`; absent fields keep their value.
#[derive(Debug, serde::Deserialize)]
pub struct RecoveryConfigUpdate {
    pub enabled: Option<bool>,
    pub max_retries: Option<u32>,
    pub retry_delay_secs: Option<u64>,
    pub check_interval_secs: Option<u64>,
}

/// POST /recovery/config
pub async fn update_recovery_config(
    State(state): State<ApiState>,
    Json(update): Json<RecoveryConfigUpdate>,
) -> impl IntoResponse {
    if let Some(enabled) = update.enabled {
        state.recovery.set_enabled(enabled).await;
    }
    if let Some(max_retries) = update.max_retries {
        state.recovery.set_max_retries(max_retries).await;
    }
    if let Some(secs) = update.retry_delay_secs {
        state.recovery.set_retry_delay(Duration::from_secs(secs)).await;
    }
    if let Some(secs) = update.check_interval_secs {
        state
            .recovery
            .set_check_interval(Duration::from_secs(secs))
            .await;
    }

    let config = state.recovery.config().await;
    ApiResponse::ok(RecoveryConfigView {
        enabled: config.enabled,
        max_retries: config.max_retries,
        retry_delay_secs: config.retry_delay.as_secs(),
        check_interval_secs: config.check_interval.as_secs(),
    })
    .into_response()
}

// ── Shards ─────────────────────────────────────────────────────

/// GET /shards/stats
pub async fn shard_stats(State(state): State<ApiState>) -> impl IntoResponse {
    match state.data_plane.cluster_stats().await {
        Ok(stats) => ApiResponse::ok(stats).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Body of `POST /shards/manage`.
#[derive(Debug, serde::Deserialize)]
pub struct ManageShardsRequest {
    #[serde(default)]
    pub action: String,
}

/// POST /shards/manage
pub async fn manage_shards(
    State(state): State<ApiState>,
    Json(req): Json<ManageShardsRequest>,
) -> impl IntoResponse {
    let result = match req.action.as_str() {
        "rebalance" => state.shards.rebalance().await,
        "optimize" => state.shards.optimize_allocation().await,
        _ => return error_response("unknown action", StatusCode::BAD_REQUEST),
    };

    match result {
        Ok(()) => ApiResponse::ok(serde_json::json!({ "action": req.action })).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use coral_health::{
        ConsistencyReport, ConsistencyStatus, ReplicationHealth, ReplicationStatus,
    };

    fn replication_entry(index: &str) -> ReplicationStatus {
        ReplicationStatus {
            index: index.to_string(),
            total_shards: 2,
            replicated_shards: 2,
            unreplicated_shards: 0,
            progress: 100.0,
            health: ReplicationHealth::Healthy,
            last_check: 1000,
        }
    }

    fn consistency_entry(index: &str) -> ConsistencyReport {
        ConsistencyReport {
            index: index.to_string(),
            status: ConsistencyStatus::Consistent,
            total_shards: 1,
            consistent_shards: 1,
            inconsistent_shards: 0,
            shard_reports: Vec::new(),
            issues: Vec::new(),
            check_time: 1000,
        }
    }

    #[tokio::test]
    async fn replication_status_read_through() {
        let mut replication = StubReplication::default();
        replication
            .statuses
            .insert("idx1".to_string(), replication_entry("idx1"));
        let state = state_with(
            StubProvisioner { fail: false },
            replication,
            StubConsistency::default(),
        );

        let resp = replication_status(State(state.clone()), Path("idx1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = replication_status(State(state.clone()), Path("ghost".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = all_replication_statuses(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn consistency_report_read_through() {
        let mut consistency = StubConsistency::default();
        consistency
            .reports
            .insert("idx1".to_string(), consistency_entry("idx1"));
        let state = state_with(
            StubProvisioner { fail: false },
            StubReplication::default(),
            consistency,
        );

        let resp = consistency_report(State(state.clone()), Path("idx1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = consistency_report(State(state), Path("ghost".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn check_now_maps_no_shards_to_404() {
        let state = test_state();
        let resp = check_consistency_now(State(state), Path("ghost".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn check_now_returns_probe_result() {
        let state = state_with(
            StubProvisioner { fail: false },
            StubReplication::default(),
            StubConsistency {
                probe: Some(consistency_entry("idx1")),
                ..StubConsistency::default()
            },
        );

        let resp = check_consistency_now(State(state), Path("idx1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn recovery_config_update_round_trip() {
        let state = test_state();

        let resp = update_recovery_config(
            State(state.clone()),
            Json(RecoveryConfigUpdate {
                enabled: Some(false),
                max_retries: Some(5),
                retry_delay_secs: Some(15),
                check_interval_secs: None,
            }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let config = state.recovery.config().await;
        assert!(!config.enabled);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay, Duration::from_secs(15));
        // Unset fields keep their defaults.
        assert_eq!(config.check_interval, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn recovery_reads_are_ok() {
        let state = test_state();
        assert_eq!(
            recovery_history(State(state.clone())).await.into_response().status(),
            StatusCode::OK
        );
        assert_eq!(
            recovery_active(State(state.clone())).await.into_response().status(),
            StatusCode::OK
        );
        assert_eq!(
            get_recovery_config(State(state)).await.into_response().status(),
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn shard_stats_and_manage() {
        let state = test_state();

        let resp = shard_stats(State(state.clone())).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = manage_shards(
            State(state.clone()),
            Json(ManageShardsRequest {
                action: "optimize".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = manage_shards(
            State(state),
            Json(ManageShardsRequest {
                action: "shuffle".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
