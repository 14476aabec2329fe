//! Ingestion pipeline: source connectors, the discovery loop, the
//! aggregator, and the orchestrator that runs them in sequence with
//! per-stage failure isolation.

pub mod aggregate;
pub mod connectors;
pub mod discovery;
pub mod http;
pub mod pipeline;
