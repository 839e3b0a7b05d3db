//! coral-shards — cluster-wide shard balance control.
//!
//! A background loop samples cluster statistics and, when shards pile up
//! past the per-node threshold, enables rebalancing on the engine and spawns
//! a progress monitor that follows active recoveries until they drain (or a
//! hard ceiling expires). A separate allocation-optimization path tunes the
//! engine's balance weights; its automatic trigger is gated behind hot-shard
//! detection, which currently has no telemetry and never fires.

pub mod controller;

pub use controller::ShardController;
