//! kubectl-backed orchestrator implementation.
//!
//! Tenant clusters run as an `elasticsearch` statefulset inside their
//! namespace; namespaces are discovered through the `es-cluster=true` label.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::{Orchestrator, OrchestratorError, OrchestratorResult};

/// Statefulset name every tenant cluster uses inside its namespace.
const STS: &str = "sts/elasticsearch";

/// Label selecting tenant cluster namespaces.
const CLUSTER_LABEL: &str = "es-cluster=true";

/// Data volume mount point inside the engine container.
const DATA_PATH: &str = "/usr/share/elasticsearch/data";

/// Orchestrator implementation shelling out to `kubectl`.
#[derive(Clone, Default)]
pub struct KubectlOrchestrator;

impl KubectlOrchestrator {
    pub fn new() -> Self {
        Self
    }

    async fn kubectl(&self, args: &[&str]) -> OrchestratorResult<String> {
        debug!(?args, "running kubectl");
        let output = Command::new("kubectl").args(args).output().await?;
        if !output.status.success() {
            return Err(OrchestratorError::CommandFailed {
                command: format!("kubectl {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl Orchestrator for KubectlOrchestrator {
    async fn cluster_namespaces(&self) -> OrchestratorResult<Vec<String>> {
        let out = self
            .kubectl(&[
                "get",
                "namespaces",
                "-l",
                CLUSTER_LABEL,
                "-o",
                "jsonpath={.items[*].metadata.name}",
            ])
            .await?;
        Ok(parse_namespaces(&out))
    }

    async fn current_replicas(&self, namespace: &str) -> OrchestratorResult<i32> {
        let out = self
            .kubectl(&["-n", namespace, "get", STS, "-o", "jsonpath={.spec.replicas}"])
            .await?;
        out.trim()
            .parse()
            .map_err(|_| OrchestratorError::Parse(format!("replica count {out:?}")))
    }

    async fn set_replicas(&self, namespace: &str, replicas: i32) -> OrchestratorResult<()> {
        let count = replicas.to_string();
        self.kubectl(&["-n", namespace, "scale", STS, "--replicas", &count])
            .await?;
        Ok(())
    }

    async fn readiness(&self, namespace: &str) -> OrchestratorResult<String> {
        let out = self
            .kubectl(&[
                "-n",
                namespace,
                "get",
                STS,
                "-o",
                "jsonpath={.status.readyReplicas}/{.spec.replicas}",
            ])
            .await?;
        let readiness = out.trim();
        if readiness.is_empty() {
            return Ok("unknown".to_string());
        }
        Ok(readiness.to_string())
    }

    async fn pod_usage(&self, namespace: &str) -> OrchestratorResult<(f64, f64)> {
        let out = self
            .kubectl(&["top", "pods", "-n", namespace, "--no-headers"])
            .await?;
        parse_top_pods(&out)
    }

    async fn disk_usage_percent(&self, namespace: &str) -> OrchestratorResult<f64> {
        let out = self
            .kubectl(&[
                "exec",
                "-n",
                namespace,
                "elasticsearch-0",
                "--",
                "df",
                "-h",
                DATA_PATH,
            ])
            .await?;
        parse_df_percent(&out)
    }
}

/// Split jsonpath namespace output on whitespace.
fn parse_namespaces(output: &str) -> Vec<String> {
    output
        .split_whitespace()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `kubectl top pods --no-headers` into (cores, MB).
///
/// Reads the first pod line; CPU comes back in millicores ("100m") and
/// memory in Mi ("512Mi").
fn parse_top_pods(output: &str) -> OrchestratorResult<(f64, f64)> {
    let Some(line) = output.lines().find(|l| !l.trim().is_empty()) else {
        return Ok((0.0, 0.0));
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(OrchestratorError::Parse(format!("top pods line {line:?}")));
    }

    let cpu = fields[1]
        .trim_end_matches('m')
        .parse::<f64>()
        .map(|millicores| millicores / 1000.0)
        .unwrap_or(0.0);
    let memory = fields[2]
        .trim_end_matches("Mi")
        .parse::<f64>()
        .unwrap_or(0.0);

    Ok((cpu, memory))
}

/// Parse `df -h` output into the usage percentage of the data volume.
fn parse_df_percent(output: &str) -> OrchestratorResult<f64> {
    let Some(line) = output.lines().nth(1) else {
        return Err(OrchestratorError::Parse("df output has no data line".into()));
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return Err(OrchestratorError::Parse(format!("df line {line:?}")));
    }
    fields[4]
        .trim_end_matches('%')
        .parse()
        .map_err(|_| OrchestratorError::Parse(format!("df percent {:?}", fields[4])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_split_on_whitespace() {
        assert_eq!(
            parse_namespaces("acme-alice-search  acme-bob-logs\n"),
            vec!["acme-alice-search", "acme-bob-logs"]
        );
        assert!(parse_namespaces("").is_empty());
    }

    #[test]
    fn top_pods_converts_units() {
        let out = "elasticsearch-0   250m   1536Mi\n";
        let (cpu, memory) = parse_top_pods(out).unwrap();
        assert_eq!(cpu, 0.25);
        assert_eq!(memory, 1536.0);
    }

    #[test]
    fn top_pods_empty_output_is_zero() {
        assert_eq!(parse_top_pods("").unwrap(), (0.0, 0.0));
        assert_eq!(parse_top_pods("\n\n").unwrap(), (0.0, 0.0));
    }

    #[test]
    fn top_pods_malformed_line_errors() {
        assert!(parse_top_pods("elasticsearch-0 250m").is_err());
    }

    #[test]
    fn df_percent_from_data_line() {
        let out = "Filesystem      Size  Used Avail Use% Mounted on\n\
                   /dev/sda1       100G   75G   25G  75% /usr/share/elasticsearch/data\n";
        assert_eq!(parse_df_percent(out).unwrap(), 75.0);
    }

    #[test]
    fn df_percent_missing_line_errors() {
        assert!(parse_df_percent("Filesystem Size\n").is_err());
    }
}
