//! Shared record types that cross crate boundaries without pulling in a
//! particular storage backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A single ingested document. Immutable after creation except `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: String,
    pub file_name: String,
    pub content_type: String,
    pub content_hash: String,
    pub language: Option<String>,
    pub raw_content: Option<Vec<u8>>,
    pub chunk_ids: Vec<Uuid>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    pub fn new(owner_id: impl Into<String>, file_name: impl Into<String>, content_type: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            content_hash: content_hash.into(),
            language: None,
            raw_content: None,
            chunk_ids: Vec::new(),
            metadata: HashMap::new(),
            uploaded_at: Utc::now(),
        }
    }
}

/// A bounded textual segment of a `Document`, with an optional embedding.
/// `embedding` is `None` until the Embedding Batcher fills it in; a `Some`
/// with the wrong dimension is treated as missing by the Chunk Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub index: i64,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl DocumentChunk {
    pub fn new(document_id: Uuid, index: i64, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            index,
            content: content.into(),
            embedding: None,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn has_valid_embedding(&self, store_dim: usize) -> bool {
        matches!(&self.embedding, Some(v) if v.len() == store_dim)
    }
}

/// A message role in conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl SessionMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self { role, text: text.into(), timestamp: Utc::now() }
    }
}

/// Per-session ordered message log. Owns its messages exclusively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub messages: Vec<SessionMessage>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4(), messages: Vec::new(), created_at: Utc::now() }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// One component of a fused retrieval score, kept alongside the final
/// score for diagnostics and for the synthesizer's `inferred` sources.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub semantic: f64,
    pub lexical: f64,
}

/// A single retrieved chunk reference with its fused score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: i64,
    pub content: String,
    pub score: f64,
    pub components: ScoreComponents,
    #[serde(default)]
    pub source_type: SourceType,
}

/// Ordered retrieval output. Invariant: non-increasing by `score`, ties
/// broken by `(document_id, chunk_index)` ascending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievalHit>,
}

/// The subset of provider configuration recognized across all backends;
/// only the fields a given `ProviderKind` needs are validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_api_key: Option<String>,
    pub embedding_endpoint: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_message: Option<String>,
    pub api_version: Option<String>,
    pub embedding_min_interval_ms: Option<u64>,
}

/// A source attributed to a synthesized answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSource {
    pub document_id: Uuid,
    pub file_name: String,
    pub relevant_content: String,
    pub relevance_score: f64,
    #[serde(default)]
    pub inferred: bool,
    #[serde(default)]
    pub source_type: SourceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SourceType {
    #[default]
    Document,
    External,
}

/// Final answer returned from the query path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    pub query: String,
    pub answer: String,
    pub sources: Vec<SearchSource>,
    pub session_id: Uuid,
    pub searched_at: DateTime<Utc>,
    #[serde(default)]
    pub extractive: bool,
}
