//! The `ChunkStore` contract: a pluggable backend for chunk persistence
//! and vector search. `LanceChunkStore` (lancedb-backed) and
//! `InMemoryChunkStore` are both provided; other backends named by
//! `StorageProvider` config are extension points, not implemented here.

use async_trait::async_trait;
use ragweave_common::{DocumentChunk, RagError};
use std::collections::BTreeMap;
use std::sync::RwLock;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, RagError>;

#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn upsert_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<()>;
    async fn delete_by_document(&self, document_id: Uuid) -> Result<()>;
    async fn top_k(&self, query_vec: &[f32], k: usize, filter: Option<&str>) -> Result<Vec<(Uuid, f64)>>;
    async fn get_chunks(&self, ids: &[Uuid]) -> Result<Vec<DocumentChunk>>;
    async fn get_all(&self, document_id: Uuid) -> Result<Vec<DocumentChunk>>;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

/// Ordered-by-`(document_id, index)` in-memory chunk store, suitable for
/// tests and small single-process deployments.
#[derive(Default)]
pub struct InMemoryChunkStore {
    chunks: RwLock<BTreeMap<Uuid, DocumentChunk>>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn upsert_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<()> {
        let mut store = self.chunks.write().unwrap();
        for chunk in chunks {
            store.insert(chunk.id, chunk);
        }
        Ok(())
    }

    async fn delete_by_document(&self, document_id: Uuid) -> Result<()> {
        let mut store = self.chunks.write().unwrap();
        store.retain(|_, c| c.document_id != document_id);
        Ok(())
    }

    async fn top_k(&self, query_vec: &[f32], k: usize, filter: Option<&str>) -> Result<Vec<(Uuid, f64)>> {
        let store = self.chunks.read().unwrap();
        let mut scored: Vec<(Uuid, f64, Uuid, i64)> = store
            .values()
            .filter(|c| filter.map(|f| c.content.contains(f)).unwrap_or(true))
            .filter_map(|c| c.embedding.as_ref().map(|e| (c.id, cosine_similarity(query_vec, e), c.document_id, c.index)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.2.cmp(&b.2))
                .then_with(|| a.3.cmp(&b.3))
        });
        scored.truncate(k);
        Ok(scored.into_iter().map(|(id, score, _, _)| (id, score)).collect())
    }

    async fn get_chunks(&self, ids: &[Uuid]) -> Result<Vec<DocumentChunk>> {
        let store = self.chunks.read().unwrap();
        Ok(ids.iter().filter_map(|id| store.get(id).cloned()).collect())
    }

    async fn get_all(&self, document_id: Uuid) -> Result<Vec<DocumentChunk>> {
        let store = self.chunks.read().unwrap();
        let mut chunks: Vec<DocumentChunk> =
            store.values().filter(|c| c.document_id == document_id).cloned().collect();
        chunks.sort_by_key(|c| c.index);
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chunk(doc: Uuid, index: i64, embedding: Option<Vec<f32>>) -> DocumentChunk {
        DocumentChunk {
            id: Uuid::new_v4(),
            document_id: doc,
            index,
            content: format!("chunk {index}"),
            embedding,
            metadata: Default::default(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn get_all_returns_chunks_ordered_by_index() {
        let store = InMemoryChunkStore::new();
        let doc = Uuid::new_v4();
        store
            .upsert_chunks(vec![chunk(doc, 2, None), chunk(doc, 0, None), chunk(doc, 1, None)])
            .await
            .unwrap();
        let chunks = store.get_all(doc).await.unwrap();
        assert_eq!(chunks.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn delete_by_document_removes_only_that_documents_chunks() {
        let store = InMemoryChunkStore::new();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        store.upsert_chunks(vec![chunk(doc_a, 0, None), chunk(doc_b, 0, None)]).await.unwrap();
        store.delete_by_document(doc_a).await.unwrap();
        assert!(store.get_all(doc_a).await.unwrap().is_empty());
        assert_eq!(store.get_all(doc_b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn top_k_breaks_ties_by_document_id_then_chunk_index() {
        let store = InMemoryChunkStore::new();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        let (first, second) = if doc_a < doc_b { (doc_a, doc_b) } else { (doc_b, doc_a) };
        let tied_first = chunk(first, 0, Some(vec![1.0, 0.0]));
        let tied_second = chunk(second, 0, Some(vec![1.0, 0.0]));
        let (first_id, second_id) = (tied_first.id, tied_second.id);
        store.upsert_chunks(vec![tied_second.clone(), tied_first.clone()]).await.unwrap();
        let ranked = store.top_k(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(ranked[0].0, first_id);
        assert_eq!(ranked[1].0, second_id);
    }

    #[tokio::test]
    async fn top_k_ranks_by_cosine_similarity() {
        let store = InMemoryChunkStore::new();
        let doc = Uuid::new_v4();
        let close = chunk(doc, 0, Some(vec![1.0, 0.0]));
        let far = chunk(doc, 1, Some(vec![0.0, 1.0]));
        let (close_id, far_id) = (close.id, far.id);
        store.upsert_chunks(vec![close.clone(), far.clone()]).await.unwrap();
        let ranked = store.top_k(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(ranked[0].0, close_id);
        assert_eq!(ranked[1].0, far_id);
    }
}
