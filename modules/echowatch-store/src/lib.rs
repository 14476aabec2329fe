//! Postgres persistence for echowatch.
//!
//! Connectors write raw rows through the deduplicating persister
//! (`mentions`, `citations`, `sources`); the aggregator owns the rollup
//! tables in `metrics`. Every write is a single conditional statement,
//! so overlapping runs are safe without coordination.

pub mod citations;
pub mod client;
pub mod mentions;
pub mod metrics;
pub mod sources;

pub use client::Store;
