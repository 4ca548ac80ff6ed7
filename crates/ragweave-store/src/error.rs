//! Storage-backend error types.

use ragweave_common::RagError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("LanceDB error: {0}")]
    LanceDb(String),

    #[error("Arrow error: {0}")]
    Arrow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate entry: {0}")]
    Duplicate(String),

    #[error("invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidEmbeddingDimension { expected: usize, actual: usize },

    #[error("store not initialized")]
    NotInitialized,

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl From<lancedb::Error> for StoreError {
    fn from(err: lancedb::Error) -> Self {
        StoreError::LanceDb(err.to_string())
    }
}

impl From<arrow_schema::ArrowError> for StoreError {
    fn from(err: arrow_schema::ArrowError) -> Self {
        StoreError::Arrow(err.to_string())
    }
}

impl From<StoreError> for RagError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) | StoreError::TableNotFound(msg) => RagError::NotFound(msg),
            StoreError::InvalidEmbeddingDimension { expected, actual } => {
                RagError::NotFound(format!("embedding dimension mismatch: expected {expected}, got {actual}"))
            }
            StoreError::Duplicate(msg) | StoreError::InvalidQuery(msg) => RagError::Validation(msg),
            StoreError::Io(e) => RagError::Io(e),
            StoreError::Serialization(e) => RagError::Serialization(e),
            other => RagError::Other(anyhow::anyhow!(other.to_string())),
        }
    }
}
