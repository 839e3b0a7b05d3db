//! coral-autoscale — metric-driven replica scaling for tenant clusters.
//!
//! Reads the latest `MetricSnapshot` per namespace from the metadata store,
//! folds it into a per-namespace trend window, biases the sample by its
//! trend, and decides a new replica count under per-user policy, quota, and
//! cool-down constraints. The actual scaling happens through the
//! orchestrator contract.

pub mod config;
pub mod scaler;
pub mod window;

pub use config::{AutoscalerConfig, ScalingPolicy};
pub use scaler::Autoscaler;
pub use window::{HistoricalWindow, Trend};
