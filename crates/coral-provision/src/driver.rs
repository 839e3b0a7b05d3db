//! Terraform invocation for tenant cluster lifecycle.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::TenantConfig;

/// Provisioning capability: materialize and destroy tenant clusters.
///
/// The HTTP surface depends on this seam rather than the terraform driver
/// directly, so alternative drivers (and test stubs) can slot in.
#[async_trait]
pub trait Provision: Send + Sync {
    async fn create(&self, config: &TenantConfig) -> ProvisionResult<()>;
    async fn delete(&self, namespace: &str) -> ProvisionResult<()>;
}

/// Result type alias for provisioning operations.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Errors from the provisioning driver.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("terraform not found in PATH")]
    TerraformMissing,

    #[error("tenant directory does not exist: {0}")]
    MissingWorkdir(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("terraform {operation} failed: {stderr}")]
    Failed { operation: String, stderr: String },
}

/// Drives terraform to create and destroy tenant cluster resources.
#[derive(Clone)]
pub struct Provisioner {
    base_dir: PathBuf,
    /// Opaque value forwarded to the terraform process as `HELM_DRIVER`.
    helm_driver: Option<String>,
}

impl Provisioner {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            helm_driver: std::env::var("HELM_DRIVER").ok(),
        }
    }

    /// Override the `HELM_DRIVER` passthrough (tests, alternative drivers).
    pub fn with_helm_driver(mut self, driver: Option<String>) -> Self {
        self.helm_driver = driver;
        self
    }

    /// Working directory for a tenant namespace.
    fn tenant_dir(&self, namespace: &str) -> PathBuf {
        self.base_dir.join("tenants").join(namespace)
    }

    /// Materialize a tenant cluster.
    ///
    /// Renders `main.tf` and runs `terraform init` + `apply -auto-approve`.
    /// Not idempotent: on failure the caller must roll back whatever metadata
    /// it wrote before calling.
    pub async fn create(&self, config: &TenantConfig) -> ProvisionResult<()> {
        ensure_terraform().await?;

        let namespace = config.namespace();
        let dir = self.tenant_dir(&namespace);
        tokio::fs::create_dir_all(&dir).await?;

        tokio::fs::write(dir.join("main.tf"), render_main_tf(config)).await?;
        debug!(%namespace, dir = %dir.display(), "tenant module rendered");

        self.run_terraform(&dir, &["init"]).await?;
        self.run_terraform(&dir, &["apply", "-auto-approve"]).await?;

        info!(%namespace, "tenant cluster created");
        Ok(())
    }

    /// Destroy a tenant cluster and remove its working directory.
    pub async fn delete(&self, namespace: &str) -> ProvisionResult<()> {
        let dir = self.tenant_dir(namespace);
        if !dir.is_dir() {
            return Err(ProvisionError::MissingWorkdir(dir));
        }
        ensure_terraform().await?;

        self.run_terraform(&dir, &["destroy", "-auto-approve"]).await?;
        tokio::fs::remove_dir_all(&dir).await?;

        info!(%namespace, "tenant cluster destroyed");
        Ok(())
    }

    async fn run_terraform(&self, dir: &Path, args: &[&str]) -> ProvisionResult<()> {
        let mut cmd = Command::new("terraform");
        cmd.args(args)
            .current_dir(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(driver) = &self.helm_driver {
            cmd.env("HELM_DRIVER", driver);
        }

        debug!(?args, dir = %dir.display(), "running terraform");
        let output = cmd.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(?args, %stderr, "terraform failed");
            return Err(ProvisionError::Failed {
                operation: args.first().unwrap_or(&"?").to_string(),
                stderr,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Provision for Provisioner {
    async fn create(&self, config: &TenantConfig) -> ProvisionResult<()> {
        Provisioner::create(self, config).await
    }

    async fn delete(&self, namespace: &str) -> ProvisionResult<()> {
        Provisioner::delete(self, namespace).await
    }
}

/// Fail fast when terraform is not installed.
async fn ensure_terraform() -> ProvisionResult<()> {
    let found = Command::new("which")
        .arg("terraform")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false);
    if found {
        Ok(())
    } else {
        Err(ProvisionError::TerraformMissing)
    }
}

/// Render the per-tenant `main.tf` instantiating the shared tenant module.
fn render_main_tf(config: &TenantConfig) -> String {
    format!(
        r#"module "tenant_cluster" {{
  source = "../../modules/tenant"

  org_id           = "{org_id}"
  user             = "{user}"
  service_name     = "{service_name}"
  replicas         = {replicas}
  cpu              = "{cpu}"
  memory           = "{memory}"
  disk_size        = "{disk_size}"
  storage_class    = "{storage_class}"
  gpu_count        = {gpu_count}
  vector_dimension = {vector_dimension}
  vector_count     = {vector_count}
}}

output "namespace" {{
  value = module.tenant_cluster.namespace
}}
"#,
        org_id = config.org_id,
        user = config.user,
        service_name = config.service_name,
        replicas = config.replicas,
        cpu = config.cpu,
        memory = config.memory,
        disk_size = config.disk_size,
        storage_class = config.storage_class,
        gpu_count = config.gpu_count,
        vector_dimension = config.vector_dimension,
        vector_count = config.vector_count,
    )
}
