//! Document Registry (C6): identity, metadata, lifecycle, and exact-hash
//! deduplication for documents, layered over the `DocumentRepository` and
//! `ChunkStore` storage contracts.

use crate::dedup::{check_duplicate, content_hash, DedupResult};
use ragweave_common::{Document, DocumentChunk, RagError, Result};
use ragweave_store::{ChunkStore, DocumentRepository};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug)]
pub struct UpsertResult {
    pub document_id: Uuid,
    pub was_new: bool,
}

#[derive(Clone)]
pub struct IngestionRepository {
    documents: Arc<DocumentRepository>,
    chunks: Arc<dyn ChunkStore>,
}

impl IngestionRepository {
    pub fn new(documents: Arc<DocumentRepository>, chunks: Arc<dyn ChunkStore>) -> Self {
        Self { documents, chunks }
    }

    pub fn chunk_store(&self) -> Arc<dyn ChunkStore> {
        self.chunks.clone()
    }

    /// Inserts a new document unless one with the same content hash already
    /// exists for this owner, in which case the existing document's id is
    /// returned and nothing is written. Grounded on the check-then-insert
    /// shape of the donor's paper upsert, with DOI/PMID lookups replaced by
    /// `(owner_id, content_hash)`.
    pub async fn upsert_document(&self, document: Document, raw_bytes: &[u8]) -> Result<UpsertResult> {
        let hash = content_hash(raw_bytes);
        let existing = self
            .documents
            .find_by_content_hash(&document.owner_id, &hash)
            .await
            .map_err(RagError::from)?
            .map(|d| (d.id, d.content_hash));

        match check_duplicate(&hash, existing.as_ref().map(|(id, hash)| (*id, hash.as_str()))) {
            DedupResult::Duplicate { document_id } => {
                tracing::debug!(document_id = %document_id, owner_id = %document.owner_id, "document already ingested, skipping insert");
                Ok(UpsertResult { document_id, was_new: false })
            }
            DedupResult::New => {
                let document_id = document.id;
                self.documents.insert(&document).await.map_err(RagError::from)?;
                Ok(UpsertResult { document_id, was_new: true })
            }
        }
    }

    pub async fn insert_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        let count = chunks.len();
        self.chunks.upsert_chunks(chunks).await?;
        Ok(count)
    }

    pub async fn attach_chunk_ids(&self, mut document: Document, chunk_ids: Vec<Uuid>) -> Result<()> {
        document.chunk_ids = chunk_ids;
        self.documents.update(&document).await.map_err(RagError::from)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>> {
        self.documents.find_by_id(id).await.map_err(RagError::from)
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<()> {
        self.chunks.delete_by_document(id).await?;
        self.documents.delete(id).await.map_err(RagError::from)
    }

    pub async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Document>> {
        self.documents.list(offset, limit).await.map_err(RagError::from)
    }

    pub async fn document_count(&self) -> Result<u64> {
        self.documents.count().await.map_err(RagError::from)
    }
}
