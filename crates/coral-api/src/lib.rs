//! coral-api — REST surface for the coral control plane.
//!
//! Thin axum handlers over the metadata store, the provisioning driver, and
//! the control loops' caches. Bodies are JSON with snake_case keys.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/clusters` | Provision a tenant cluster (quota-gated) |
//! | GET | `/clusters` | List cluster statuses with readiness overlay |
//! | GET | `/clusters/{namespace}` | One cluster status |
//! | DELETE | `/clusters` | Destroy a tenant cluster |
//! | POST | `/clusters/scale` | Re-provision with a new replica count |
//! | GET | `/replication/status[/{index}]` | Replication cache read-through |
//! | GET | `/consistency/reports[/{index}]` | Consistency cache read-through |
//! | POST | `/consistency/check/{index}` | Synchronous consistency check |
//! | GET | `/recovery/history`, `/recovery/active` | Recovery records |
//! | GET/POST | `/recovery/config` | Recovery knobs |
//! | GET/PUT | `/metadata/quotas/{tenant}` | Tenant quota |
//! | POST/GET | `/metadata/indices[/{id}]` | Index metadata CRUD |
//! | POST/GET/DELETE | `/autoscaler/policies[/{user}]` | Scaling policies |
//! | GET | `/shards/stats` | Cluster shard tallies |
//! | POST | `/shards/manage` | Manual rebalance / optimize |
//! | GET | `/health` | Liveness |

pub mod handlers;
pub mod ops_handlers;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use coral_autoscale::Autoscaler;
use coral_health::{ConsistencyReader, ReplicationReader};
use coral_meta::MetaStore;
use coral_orchestrator::Orchestrator;
use coral_provision::Provision;
use coral_recovery::RecoveryManager;
use coral_search::DataPlane;
use coral_shards::ShardController;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: MetaStore,
    pub provisioner: Arc<dyn Provision>,
    pub orchestrator: Arc<dyn Orchestrator>,
    pub data_plane: Arc<dyn DataPlane>,
    pub autoscaler: Arc<Autoscaler>,
    pub replication: Arc<dyn ReplicationReader>,
    pub consistency: Arc<dyn ConsistencyReader>,
    pub recovery: RecoveryManager,
    pub shards: Arc<ShardController>,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/clusters",
            post(handlers::create_cluster)
                .get(handlers::list_clusters)
                .delete(handlers::delete_cluster),
        )
        .route("/clusters/scale", post(handlers::scale_cluster))
        .route("/clusters/{namespace}", get(handlers::get_cluster))
        .route("/replication/status", get(ops_handlers::all_replication_statuses))
        .route(
            "/replication/status/{index}",
            get(ops_handlers::replication_status),
        )
        .route("/consistency/reports", get(ops_handlers::all_consistency_reports))
        .route(
            "/consistency/reports/{index}",
            get(ops_handlers::consistency_report),
        )
        .route("/consistency/check/{index}", post(ops_handlers::check_consistency_now))
        .route("/recovery/history", get(ops_handlers::recovery_history))
        .route("/recovery/active", get(ops_handlers::recovery_active))
        .route(
            "/recovery/config",
            get(ops_handlers::get_recovery_config).post(ops_handlers::update_recovery_config),
        )
        .route(
            "/metadata/quotas/{tenant}",
            get(handlers::get_quota).put(handlers::put_quota),
        )
        .route(
            "/metadata/indices",
            post(handlers::create_index_metadata).get(handlers::list_index_metadata),
        )
        .route(
            "/metadata/indices/{id}",
            get(handlers::get_index_metadata).delete(handlers::delete_index_metadata),
        )
        .route(
            "/autoscaler/policies",
            post(handlers::set_scaling_policy).get(handlers::list_scaling_policies),
        )
        .route(
            "/autoscaler/policies/{user}",
            get(handlers::get_scaling_policy).delete(handlers::remove_scaling_policy),
        )
        .route("/shards/stats", get(ops_handlers::shard_stats))
        .route("/shards/manage", post(ops_handlers::manage_shards))
        .route("/health", get(handlers::health))
        .with_state(state)
}
