//! ragweave-ingestion — the ingestion/indexing pipeline: Document Registry,
//! deterministic chunker, embedding batcher, and a folder watcher that
//! feeds it. Per-format file parsing (PDF/Office/OCR/speech) is out of
//! scope here; callers hand this crate already-decoded text.

pub mod chunker;
pub mod dedup;
pub mod embedding;
pub mod folder_watcher;
pub mod models;
pub mod pipeline;
pub mod repository;

pub use chunker::{chunk_text, ChunkerConfig};
pub use dedup::{check_duplicate, content_hash, DedupResult};
pub use embedding::{BatchJobStats, BatcherConfig, EmbeddingBatcher};
pub use folder_watcher::{IngestJob, JobKind, WatcherConfig};
pub use models::{IngestOutcome, RegenerateSummary, UploadRequest};
pub use pipeline::IngestionPipeline;
pub use repository::{IngestionRepository, UpsertResult};
