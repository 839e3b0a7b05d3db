//! corald — the coral control-plane daemon.
//!
//! Single binary that runs the metadata store, the HTTP surface, and every
//! background control loop: metric collection, autoscaling, replication
//! monitoring, consistency checking, shard balance, and auto-recovery.
//!
//! # Usage
//!
//! ```text
//! corald --port 8080 --metadata-dir /var/lib/coral
//! ```
//!
//! Flags fall back to the environment: `PORT`, `ES_URL` / `ES_BASE_URL`,
//! `METADATA_DIR`, and `HELM_DRIVER` (forwarded into provisioning).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use coral_autoscale::{Autoscaler, AutoscalerConfig};
use coral_health::{ConsistencyChecker, ConsistencyReader, ReplicationMonitor, ReplicationReader};
use coral_metrics::{MetricCollector, StaticQueryRate};
use coral_orchestrator::{KubectlOrchestrator, Orchestrator};
use coral_recovery::{RecoveryConfig, RecoveryManager};
use coral_search::{DataPlane, SearchClient};
use coral_shards::ShardController;

#[derive(Parser)]
#[command(name = "corald", about = "coral control-plane daemon")]
struct Cli {
    /// HTTP listen port.
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Search engine base URL (falls back to ES_URL / ES_BASE_URL).
    #[arg(long)]
    es_url: Option<String>,

    /// Root directory for the metadata store and provisioning workdirs.
    #[arg(long, env = "METADATA_DIR", default_value = "/var/lib/coral")]
    metadata_dir: PathBuf,

    /// Metric collection interval in seconds.
    #[arg(long, default_value = "30")]
    metrics_interval: u64,

    /// Autoscaler evaluation interval in seconds.
    #[arg(long, default_value = "60")]
    autoscale_interval: u64,

    /// Replication monitor interval in seconds.
    #[arg(long, default_value = "30")]
    replication_interval: u64,

    /// Consistency checker interval in seconds.
    #[arg(long, default_value = "300")]
    consistency_interval: u64,

    /// Shard controller interval in seconds.
    #[arg(long, default_value = "30")]
    shard_interval: u64,

    /// Recovery manager check interval in seconds.
    #[arg(long, default_value = "60")]
    recovery_interval: u64,

    /// Fixed query rate reported for every namespace until a telemetry
    /// pipeline is wired in.
    #[arg(long, default_value = "0.0")]
    query_rate: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,corald=debug,coral=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    info!("coral control plane starting");

    // ── Stores and clients ─────────────────────────────────────

    std::fs::create_dir_all(&cli.metadata_dir)?;
    let store = coral_meta::MetaStore::open(&cli.metadata_dir.join("coral.redb"))?;
    info!(dir = %cli.metadata_dir.display(), "metadata store opened");

    let search = match &cli.es_url {
        Some(url) => SearchClient::new(url.clone()),
        None => SearchClient::from_env(),
    };
    info!(engine = search.base_url(), "data-plane client ready");
    let data_plane: Arc<dyn DataPlane> = Arc::new(search.clone());

    let orchestrator: Arc<dyn Orchestrator> = Arc::new(KubectlOrchestrator::new());
    let provisioner = Arc::new(coral_provision::Provisioner::new(&cli.metadata_dir));

    // ── Control loops ──────────────────────────────────────────

    let collector = Arc::new(MetricCollector::new(
        store.clone(),
        orchestrator.clone(),
        Arc::new(StaticQueryRate(cli.query_rate)),
        Duration::from_secs(cli.metrics_interval),
    ));

    let autoscaler = Arc::new(Autoscaler::new(
        store.clone(),
        orchestrator.clone(),
        AutoscalerConfig::default(),
        Duration::from_secs(cli.autoscale_interval),
    ));

    let replication = Arc::new(ReplicationMonitor::new(
        data_plane.clone(),
        Duration::from_secs(cli.replication_interval),
    ));
    let consistency = Arc::new(ConsistencyChecker::new(
        data_plane.clone(),
        Duration::from_secs(cli.consistency_interval),
    ));

    let shards = Arc::new(ShardController::new(
        data_plane.clone(),
        Duration::from_secs(cli.shard_interval),
    ));

    let replication_reader: Arc<dyn ReplicationReader> = replication.clone();
    let consistency_reader: Arc<dyn ConsistencyReader> = consistency.clone();
    let recovery = RecoveryManager::new(
        data_plane.clone(),
        replication_reader.clone(),
        consistency_reader.clone(),
        RecoveryConfig {
            check_interval: Duration::from_secs(cli.recovery_interval),
            ..RecoveryConfig::default()
        },
    );

    // ── Background tasks ───────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::new();
    {
        let collector = collector.clone();
        let rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move { collector.run(rx).await }));
    }
    {
        let autoscaler = autoscaler.clone();
        let rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move { autoscaler.run(rx).await }));
    }
    {
        let replication = replication.clone();
        let rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move { replication.run(rx).await }));
    }
    {
        let consistency = consistency.clone();
        let rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move { consistency.run(rx).await }));
    }
    {
        let shards = shards.clone();
        let rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move { shards.run(rx).await }));
    }
    {
        let recovery = recovery.clone();
        let rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move { recovery.run(rx).await }));
    }
    info!("control loops started");

    // ── API server ─────────────────────────────────────────────

    let state = coral_api::ApiState {
        store,
        provisioner,
        orchestrator,
        data_plane,
        autoscaler,
        replication: replication_reader,
        consistency: consistency_reader,
        recovery,
        shards,
    };
    let router = coral_api::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    for handle in handles {
        let _ = handle.await;
    }

    info!("coral control plane stopped");
    Ok(())
}
