//! coral-provision — materializes tenant cluster resources via terraform.
//!
//! Each tenant gets a working directory under `{base_dir}/tenants/{namespace}`
//! holding a rendered `main.tf` that instantiates the shared tenant module.
//! `create` runs `terraform init` + `apply`; `delete` runs `destroy` and
//! removes the directory. Both calls are synchronous from the caller's point
//! of view, may take minutes, and are not idempotent: a failed `create`
//! leaves the caller responsible for rolling back its metadata side effects.

pub mod config;
pub mod driver;

pub use config::TenantConfig;
pub use driver::{Provision, ProvisionError, ProvisionResult, Provisioner};
