//! coral-meta — embedded metadata store for the coral control plane.
//!
//! Backed by [redb](https://docs.rs/redb), holds the authoritative record of
//! tenant containers, deployment statuses, tenant quotas, metric snapshots,
//! and index metadata.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{user}/{service}`, `{namespace}:{timestamp}`) enable
//! efficient prefix scans for related records.
//!
//! The `MetaStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. Reads of a single record observe a
//! consistent snapshot (one read transaction); there is no cross-entity
//! atomicity, and the last write per key wins.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{MetaError, MetaResult};
pub use store::MetaStore;
pub use types::*;
