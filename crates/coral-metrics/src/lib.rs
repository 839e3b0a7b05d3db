//! coral-metrics — per-namespace resource usage collection.
//!
//! A background loop samples pod CPU/memory, data-volume disk usage, and
//! query rate for every tenant namespace, persists an append-only
//! `MetricSnapshot`, and folds the sample into the deployment status as a
//! load-tier phase. The autoscaler consumes the snapshots; the API surfaces
//! the status.

pub mod collector;

pub use collector::{MetricCollector, QueryRateSource, StaticQueryRate};
