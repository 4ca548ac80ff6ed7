//! End-to-end ingestion pipeline: Document Registry → Chunker → Embedding
//! Batcher → Chunk Store. Per-format parsing happens upstream; this
//! pipeline starts from already-decoded text bytes.

use crate::chunker::{chunk_text, ChunkerConfig};
use crate::embedding::EmbeddingBatcher;
use crate::models::{IngestOutcome, RegenerateSummary, UploadRequest};
use crate::repository::IngestionRepository;
use ragweave_common::{Document, DocumentChunk, RagError, Result};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct IngestionPipeline {
    repo: Arc<IngestionRepository>,
    batcher: Arc<EmbeddingBatcher>,
    chunker_config: ChunkerConfig,
}

impl IngestionPipeline {
    pub fn new(repo: Arc<IngestionRepository>, batcher: Arc<EmbeddingBatcher>, chunker_config: ChunkerConfig) -> Self {
        Self { repo, batcher, chunker_config }
    }

    /// Ingests one upload: dedup check, chunk, embed, persist. Idempotent —
    /// re-uploading identical bytes for the same owner produces no new
    /// chunks and returns the original document's id.
    #[instrument(skip(self, request), fields(owner_id = %request.owner_id, file_name = %request.file_name))]
    pub async fn upload(&self, request: UploadRequest) -> Result<IngestOutcome> {
        let text = String::from_utf8_lossy(&request.content).into_owned();

        let mut document = Document::new(&request.owner_id, &request.file_name, &request.content_type, "placeholder");
        document.language = request.language.clone();
        document.raw_content = Some(request.content.clone());
        document.metadata = request.metadata.clone();

        let upsert = self.repo.upsert_document(document.clone(), &request.content).await?;
        if !upsert.was_new {
            info!(document_id = %upsert.document_id, "duplicate upload, skipping chunk/embed");
            return Ok(IngestOutcome::Duplicate { document_id: upsert.document_id });
        }
        document.id = upsert.document_id;

        let pieces = chunk_text(&text, &self.chunker_config);
        if pieces.is_empty() {
            return Ok(IngestOutcome::Ingested { document_id: document.id, chunk_count: 0 });
        }

        let chunks: Vec<DocumentChunk> =
            pieces.iter().enumerate().map(|(i, content)| DocumentChunk::new(document.id, i as i64, content.clone())).collect();

        let (vectors, stats) = self.batcher.embed_all(pieces).await;
        info!(total = stats.total, successful = stats.successful, elapsed_ms = stats.elapsed_ms, "embedded new chunks");

        let chunks: Vec<DocumentChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(mut chunk, vector)| {
                chunk.embedding = vector;
                chunk
            })
            .collect();

        let chunk_ids: Vec<Uuid> = chunks.iter().map(|c| c.id).collect();
        let chunk_count = self.repo.insert_chunks(chunks).await?;
        self.repo.attach_chunk_ids(document, chunk_ids).await?;

        Ok(IngestOutcome::Ingested { document_id: upsert.document_id, chunk_count })
    }

    /// Regenerates embeddings for every chunk of every document owned by
    /// `owner_id` (or all documents if `None`). Chunks with a valid
    /// current-dimension vector are skipped — idempotent per §8.
    #[instrument(skip(self))]
    pub async fn regenerate_embeddings(&self, owner_id: Option<&str>, current_dim: usize) -> Result<RegenerateSummary> {
        let mut summary = RegenerateSummary::default();
        let documents = self.repo.list(0, usize::MAX / 2).await?;

        for document in documents {
            if let Some(owner) = owner_id {
                if document.owner_id != owner {
                    continue;
                }
            }

            let chunk_store = self.repo.chunk_store();
            let chunks = chunk_store.get_all(document.id).await?;
            let stale: Vec<_> = chunks.into_iter().filter(|c| !c.has_valid_embedding(current_dim)).collect();
            summary.checked += stale.len();

            if stale.is_empty() {
                continue;
            }

            let texts: Vec<String> = stale.iter().map(|c| c.content.clone()).collect();
            let (vectors, _stats) = self.batcher.embed_all(texts).await;

            let mut refreshed = Vec::with_capacity(stale.len());
            for (mut chunk, vector) in stale.into_iter().zip(vectors) {
                match vector {
                    Some(v) => {
                        chunk.embedding = Some(v);
                        summary.regenerated += 1;
                    }
                    None => {
                        warn!(chunk_id = %chunk.id, "re-embed failed, leaving chunk without a vector");
                        summary.failed += 1;
                    }
                }
                refreshed.push(chunk);
            }
            chunk_store.upsert_chunks(refreshed).await?;
        }

        Ok(summary)
    }

    pub async fn clear_embeddings(&self) -> Result<()> {
        let documents = self.repo.list(0, usize::MAX / 2).await?;
        let chunk_store = self.repo.chunk_store();
        for document in documents {
            let mut chunks = chunk_store.get_all(document.id).await?;
            for chunk in &mut chunks {
                chunk.embedding = None;
            }
            chunk_store.upsert_chunks(chunks).await?;
        }
        Ok(())
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<()> {
        self.repo.find_by_id(id).await?.ok_or_else(|| RagError::NotFound(id.to_string()))?;
        self.repo.delete_document(id).await
    }

    pub async fn clear_all_documents(&self) -> Result<()> {
        let documents = self.repo.list(0, usize::MAX / 2).await?;
        for document in documents {
            self.repo.delete_document(document.id).await?;
        }
        Ok(())
    }
}

// Document persistence runs against a real LanceDB connection (see
// `ragweave-store`), so `IngestionPipeline` itself is exercised by
// integration tests rather than here; this module covers the chunking
// and embedding primitives it composes (see `chunker`, `embedding`, `dedup`).
