//! Cluster lifecycle, metadata, and policy handlers.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{error, info, warn};

use coral_autoscale::ScalingPolicy;
use coral_meta::{
    namespace_for, DeploymentStatus, IndexMetadata, Phase, TenantContainer, TenantQuota,
};
use coral_provision::TenantConfig;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
pub(crate) struct ApiResponse<T: serde::Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub(crate) fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> axum::response::Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ── Clusters ───────────────────────────────────────────────────

/// Body of `POST /clusters`.
#[derive(Debug, serde::Deserialize)]
pub struct CreateClusterRequest {
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub cpu_request: String,
    #[serde(default)]
    pub cpu_limit: String,
    #[serde(default)]
    pub mem_request: String,
    #[serde(default)]
    pub mem_limit: String,
    #[serde(default)]
    pub disk_size: String,
    #[serde(default)]
    pub gpu_count: i32,
    #[serde(default)]
    pub vector_dimension: i32,
    #[serde(default)]
    pub vector_count: i64,
}

/// POST /clusters
pub async fn create_cluster(
    State(state): State<ApiState>,
    Json(req): Json<CreateClusterRequest>,
) -> impl IntoResponse {
    if req.org_id.is_empty() {
        return error_response("org_id is required for multi-tenancy", StatusCode::BAD_REQUEST);
    }
    if req.user.is_empty() {
        return error_response("user is required", StatusCode::BAD_REQUEST);
    }
    if req.service_name.is_empty() {
        return error_response("service_name is required", StatusCode::BAD_REQUEST);
    }

    // Quota gate; a failed check logs and admits rather than blocking.
    match state.store.check_tenant_quota(&req.user) {
        Ok((true, _)) => {}
        Ok((false, quota)) => {
            return error_response(
                &format!(
                    "tenant quota exceeded: max indices {}, current indices {}",
                    quota.max_indices, quota.current_indices
                ),
                StatusCode::FORBIDDEN,
            );
        }
        Err(e) => warn!(user = %req.user, error = %e, "quota check failed"),
    }

    let namespace = namespace_for(&req.org_id, &req.user, &req.service_name);
    let now = epoch_secs();

    // Metadata first, resources second: a failed provision rolls the
    // metadata back, while orphaned resources without metadata would be
    // invisible to every loop.
    let mut container = TenantContainer {
        org_id: req.org_id.clone(),
        user: req.user.clone(),
        service_name: req.service_name.clone(),
        namespace: namespace.clone(),
        replicas: req.replicas,
        cpu: req.cpu_request.clone(),
        memory: req.mem_request.clone(),
        disk: req.disk_size.clone(),
        gpu_count: req.gpu_count,
        vector_dimension: req.vector_dimension,
        vector_count: req.vector_count,
        phase: Phase::Creating,
        created_at: now,
        sync_time: now,
        deleted: false,
        deleted_at: None,
    };
    if let Err(e) = state.store.put_tenant_container(&container) {
        error!(%namespace, error = %e, "failed to save tenant container");
        return error_response(&format!("failed to save tenant metadata: {e}"), StatusCode::INTERNAL_SERVER_ERROR);
    }

    let mut status = DeploymentStatus {
        namespace: namespace.clone(),
        org_id: req.org_id.clone(),
        user: req.user.clone(),
        service_name: req.service_name.clone(),
        phase: Phase::Creating,
        cpu_usage: 0.0,
        memory_usage: 0.0,
        disk_usage: 0.0,
        qps: 0.0,
        gpu_count: req.gpu_count,
        vector_dimension: req.vector_dimension,
        vector_count: req.vector_count,
        replicas: req.replicas,
        created_at: now,
        updated_at: now,
        details: HashMap::from([
            ("cpu_request".to_string(), serde_json::json!(req.cpu_request)),
            ("cpu_limit".to_string(), serde_json::json!(req.cpu_limit)),
            ("mem_request".to_string(), serde_json::json!(req.mem_request)),
            ("mem_limit".to_string(), serde_json::json!(req.mem_limit)),
            ("disk_size".to_string(), serde_json::json!(req.disk_size)),
        ]),
    };
    if let Err(e) = state.store.put_deployment_status(&status) {
        error!(%namespace, error = %e, "failed to save deployment status");
        let _ = state.store.delete_tenant_container(&req.user, &req.service_name);
        return error_response(&format!("failed to save deployment status: {e}"), StatusCode::INTERNAL_SERVER_ERROR);
    }

    let mut config = TenantConfig {
        org_id: req.org_id.clone(),
        user: req.user.clone(),
        service_name: req.service_name.clone(),
        replicas: req.replicas,
        cpu: req.cpu_request.clone(),
        memory: req.mem_request.clone(),
        disk_size: req.disk_size.clone(),
        storage_class: String::new(),
        gpu_count: req.gpu_count,
        vector_dimension: req.vector_dimension,
        vector_count: req.vector_count,
    };
    config.apply_defaults();

    if let Err(e) = state.provisioner.create(&config).await {
        error!(%namespace, error = %e, "provisioning failed, rolling back metadata");
        let _ = state.store.delete_tenant_container(&req.user, &req.service_name);
        status.phase = Phase::Failed;
        status.updated_at = epoch_secs();
        let _ = state.store.put_deployment_status(&status);
        return error_response(&format!("failed to create cluster: {e}"), StatusCode::INTERNAL_SERVER_ERROR);
    }

    if let Err(e) = state.store.update_tenant_quota_usage(&req.user, 1) {
        warn!(user = %req.user, error = %e, "quota usage update failed");
    }

    status.phase = Phase::Created;
    status.updated_at = epoch_secs();
    let _ = state.store.put_deployment_status(&status);

    container.phase = Phase::Created;
    container.sync_time = epoch_secs();
    let _ = state.store.put_tenant_container(&container);

    info!(%namespace, "cluster created");
    (
        StatusCode::CREATED,
        ApiResponse::ok(serde_json::json!({
            "namespace": namespace,
            "phase": "created"
        })),
    )
        .into_response()
}

/// One cluster status with the orchestrator's readiness overlay.
#[derive(serde::Serialize)]
pub struct ClusterView {
    #[serde(flatten)]
    pub status: DeploymentStatus,
    pub readiness: String,
}

/// GET /clusters
pub async fn list_clusters(State(state): State<ApiState>) -> impl IntoResponse {
    let statuses = match state.store.list_deployment_status() {
        Ok(statuses) => statuses,
        Err(e) => return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    };

    let mut clusters = Vec::with_capacity(statuses.len());
    for status in statuses {
        let readiness = state
            .orchestrator
            .readiness(&status.namespace)
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        clusters.push(ClusterView { status, readiness });
    }

    ApiResponse::ok(clusters).into_response()
}

/// GET /clusters/{namespace}
pub async fn get_cluster(
    State(state): State<ApiState>,
    Path(namespace): Path<String>,
) -> impl IntoResponse {
    match state.store.get_deployment_status(&namespace) {
        Ok(Some(status)) => ApiResponse::ok(status).into_response(),
        Ok(None) => error_response("cluster not found", StatusCode::NOT_FOUND),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Body of `DELETE /clusters`.
#[derive(Debug, serde::Deserialize)]
pub struct DeleteClusterRequest {
    #[serde(default)]
    pub namespace: String,
}

/// DELETE /clusters
pub async fn delete_cluster(
    State(state): State<ApiState>,
    Json(req): Json<DeleteClusterRequest>,
) -> impl IntoResponse {
    if req.namespace.is_empty() {
        return error_response("namespace is required", StatusCode::BAD_REQUEST);
    }

    let deployment = match state.store.get_deployment_status(&req.namespace) {
        Ok(deployment) => deployment,
        Err(e) => {
            warn!(namespace = %req.namespace, error = %e, "status lookup failed");
            None
        }
    };

    if let Err(e) = state.provisioner.delete(&req.namespace).await {
        error!(namespace = %req.namespace, error = %e, "cluster destroy failed");
        return error_response(&format!("failed to delete cluster: {e}"), StatusCode::INTERNAL_SERVER_ERROR);
    }

    if let Some(mut deployment) = deployment {
        let _ = state
            .store
            .delete_tenant_container(&deployment.user, &deployment.service_name);

        deployment.phase = Phase::Deleted;
        deployment.updated_at = epoch_secs();
        let _ = state.store.put_deployment_status(&deployment);

        if let Err(e) = state.store.update_tenant_quota_usage(&deployment.user, -1) {
            warn!(user = %deployment.user, error = %e, "quota release failed");
        }
    }

    info!(namespace = %req.namespace, "cluster deleted");
    ApiResponse::ok(serde_json::json!({
        "namespace": req.namespace,
        "phase": "deleted"
    }))
    .into_response()
}

/// Body of `POST /clusters/scale`.
#[derive(Debug, serde::Deserialize)]
pub struct ScaleClusterRequest {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub replicas: i32,
}

/// POST /clusters/scale
pub async fn scale_cluster(
    State(state): State<ApiState>,
    Json(req): Json<ScaleClusterRequest>,
) -> impl IntoResponse {
    if req.namespace.is_empty() {
        return error_response("namespace is required", StatusCode::BAD_REQUEST);
    }
    if req.replicas < 1 {
        return error_response("replicas must be at least 1", StatusCode::BAD_REQUEST);
    }

    let mut deployment = match state.store.get_deployment_status(&req.namespace) {
        Ok(Some(deployment)) => deployment,
        Ok(None) => return error_response("cluster not found", StatusCode::NOT_FOUND),
        Err(e) => return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    };

    let detail = |key: &str| -> String {
        deployment
            .details
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    let mut config = TenantConfig {
        org_id: deployment.org_id.clone(),
        user: deployment.user.clone(),
        service_name: deployment.service_name.clone(),
        replicas: req.replicas,
        cpu: detail("cpu_request"),
        memory: detail("mem_request"),
        disk_size: detail("disk_size"),
        storage_class: String::new(),
        gpu_count: deployment.gpu_count,
        vector_dimension: deployment.vector_dimension,
        vector_count: deployment.vector_count,
    };
    config.apply_defaults();

    if let Err(e) = state.provisioner.create(&config).await {
        error!(namespace = %req.namespace, error = %e, "scale re-provision failed");
        return error_response(&format!("failed to scale cluster: {e}"), StatusCode::INTERNAL_SERVER_ERROR);
    }

    deployment.replicas = req.replicas;
    deployment
        .details
        .insert("replicas".to_string(), serde_json::json!(req.replicas));
    deployment.phase = Phase::Scaling;
    deployment.updated_at = epoch_secs();
    let _ = state.store.put_deployment_status(&deployment);

    if let Ok(Some(mut container)) = state
        .store
        .get_tenant_container(&deployment.user, &deployment.service_name)
    {
        container.replicas = req.replicas;
        container.sync_time = epoch_secs();
        let _ = state.store.put_tenant_container(&container);
    }

    info!(namespace = %req.namespace, replicas = req.replicas, "cluster scaling initiated");
    ApiResponse::ok(serde_json::json!({
        "namespace": req.namespace,
        "replicas": req.replicas,
        "phase": "scaling"
    }))
    .into_response()
}

// ── Quotas ─────────────────────────────────────────────────────

/// GET /metadata/quotas/{tenant}
pub async fn get_quota(
    State(state): State<ApiState>,
    Path(tenant): Path<String>,
) -> impl IntoResponse {
    match state.store.get_tenant_quota(&tenant) {
        Ok(Some(quota)) => ApiResponse::ok(quota).into_response(),
        Ok(None) => error_response("quota not found", StatusCode::NOT_FOUND),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// PUT /metadata/quotas/{tenant}
pub async fn put_quota(
    State(state): State<ApiState>,
    Path(tenant): Path<String>,
    Json(mut quota): Json<TenantQuota>,
) -> impl IntoResponse {
    quota.tenant_id = tenant;
    quota.updated_at = epoch_secs();
    match state.store.put_tenant_quota(&quota) {
        Ok(()) => ApiResponse::ok(quota).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

// ── Index metadata ─────────────────────────────────────────────

/// POST /metadata/indices
pub async fn create_index_metadata(
    State(state): State<ApiState>,
    Json(metadata): Json<IndexMetadata>,
) -> impl IntoResponse {
    if metadata.id.is_empty() {
        return error_response("id is required", StatusCode::BAD_REQUEST);
    }
    match state.store.put_index_metadata(&metadata) {
        Ok(()) => (StatusCode::CREATED, ApiResponse::ok(metadata)).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// GET /metadata/indices
pub async fn list_index_metadata(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_index_metadata() {
        Ok(list) => ApiResponse::ok(list).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// GET /metadata/indices/{id}
pub async fn get_index_metadata(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_index_metadata(&id) {
        Ok(Some(metadata)) => ApiResponse::ok(metadata).into_response(),
        Ok(None) => error_response("index metadata not found", StatusCode::NOT_FOUND),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// DELETE /metadata/indices/{id}
pub async fn delete_index_metadata(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_index_metadata(&id) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("index metadata not found", StatusCode::NOT_FOUND),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

// ── Scaling policies ───────────────────────────────────────────

/// POST /autoscaler/policies
pub async fn set_scaling_policy(
    State(state): State<ApiState>,
    Json(policy): Json<ScalingPolicy>,
) -> impl IntoResponse {
    if policy.user_id.is_empty() {
        return error_response("user_id is required", StatusCode::BAD_REQUEST);
    }
    state.autoscaler.set_policy(policy.clone()).await;
    ApiResponse::ok(policy).into_response()
}

/// GET /autoscaler/policies
pub async fn list_scaling_policies(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.autoscaler.list_policies().await).into_response()
}

/// GET /autoscaler/policies/{user}
pub async fn get_scaling_policy(
    State(state): State<ApiState>,
    Path(user): Path<String>,
) -> impl IntoResponse {
    match state.autoscaler.policy(&user).await {
        Some(policy) => ApiResponse::ok(policy).into_response(),
        None => error_response("scaling policy not found", StatusCode::NOT_FOUND),
    }
}

/// DELETE /autoscaler/policies/{user}
pub async fn remove_scaling_policy(
    State(state): State<ApiState>,
    Path(user): Path<String>,
) -> impl IntoResponse {
    if state.autoscaler.remove_policy(&user).await {
        ApiResponse::ok("removed").into_response()
    } else {
        error_response("scaling policy not found", StatusCode::NOT_FOUND)
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /health
pub async fn health() -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({ "status": "ok" }))
}
