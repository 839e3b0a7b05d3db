//! Tenant cluster configuration handed to the provisioning driver.

use coral_meta::namespace_for;

/// Everything terraform needs to materialize one tenant cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantConfig {
    pub org_id: String,
    pub user: String,
    pub service_name: String,
    pub replicas: i32,
    pub cpu: String,
    pub memory: String,
    pub disk_size: String,
    pub storage_class: String,
    pub gpu_count: i32,
    pub vector_dimension: i32,
    pub vector_count: i64,
}

impl TenantConfig {
    /// The namespace this config materializes.
    pub fn namespace(&self) -> String {
        namespace_for(&self.org_id, &self.user, &self.service_name)
    }

    /// Fill unset fields with their defaults before invocation.
    ///
    /// Bare-integer memory and disk quantities gain a `Gi` suffix so callers
    /// may pass either "2" or "2Gi".
    pub fn apply_defaults(&mut self) {
        if self.replicas <= 0 {
            self.replicas = 1;
        }
        if self.cpu.is_empty() {
            self.cpu = "500m".to_string();
        }
        if self.memory.is_empty() {
            self.memory = "1Gi".to_string();
        }
        if self.memory.parse::<i64>().is_ok() {
            self.memory.push_str("Gi");
        }
        if self.disk_size.is_empty() {
            self.disk_size = "10Gi".to_string();
        }
        if self.disk_size.parse::<i64>().is_ok() {
            self.disk_size.push_str("Gi");
        }
        if self.storage_class.is_empty() {
            self.storage_class = "hostpath".to_string();
        }
        if self.vector_dimension <= 0 {
            self.vector_dimension = 128;
        }
        if self.vector_count <= 0 {
            self.vector_count = 10_000;
        }
    }
}
