//! coral-search — typed client for the Elasticsearch-compatible data plane.
//!
//! Thin operations over the search engine's HTTP API: index CRUD, cluster
//! settings, shard listings (`/_cat/shards`), active recoveries
//! (`/_recovery`), and cluster statistics. Every call carries a bounded
//! timeout and surfaces non-2xx responses as structured errors; retry policy
//! belongs to the caller.

pub mod client;
pub mod error;
pub mod types;

pub use client::{DataPlane, SearchClient};
pub use error::{SearchError, SearchResult};
pub use types::*;
