//! ragweave-common — shared types, errors, and traits used across all ragweave crates.

pub mod domain;
pub mod error;

pub use domain::{
    Document, DocumentChunk, ProviderConfig, RagResponse, RetrievalHit, RetrievalResult, Role,
    ScoreComponents, SearchSource, Session, SessionMessage, SourceType,
};
pub use error::{RagError, Result};
