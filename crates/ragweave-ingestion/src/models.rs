//! Pipeline-local request/result types. Document and chunk storage shapes
//! live in `ragweave_common::domain`; these are the extra bits the
//! ingestion pipeline itself needs to thread through a run.

use std::collections::HashMap;

/// A single ingest request. Per-format parsing (PDF/Office/OCR/speech)
/// happens upstream of this pipeline; by the time bytes reach here they
/// are treated as UTF-8 text content to chunk and embed.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub owner_id: String,
    pub file_name: String,
    pub content_type: String,
    pub language: Option<String>,
    pub content: Vec<u8>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Outcome of running a single document through the pipeline.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Ingested { document_id: uuid::Uuid, chunk_count: usize },
    Duplicate { document_id: uuid::Uuid },
}

/// Summary of one embedding-regeneration or re-embed sweep.
#[derive(Debug, Clone, Default)]
pub struct RegenerateSummary {
    pub checked: usize,
    pub regenerated: usize,
    pub skipped_valid: usize,
    pub failed: usize,
}
