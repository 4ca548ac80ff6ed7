//! ragweave-tools — the External-tool Client (C11): discovery and
//! keyword-scored invocation of remote tool servers, surfaced to the
//! retrieval path as pseudo-chunks.

pub mod client;

pub use client::{ExternalToolClient, ToolChunk, ToolDescriptor};
