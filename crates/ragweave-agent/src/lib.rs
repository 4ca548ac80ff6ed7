//! ragweave-agent — wires the provider, storage, ingestion, retrieval,
//! synthesis, router, and external-tool crates into one library facade.
//! No HTTP surface ships here; `main.rs` is a thin demonstration binary.

pub mod agent;
pub mod config;

pub use agent::{Agent, DocumentStats, QueryRequest};
