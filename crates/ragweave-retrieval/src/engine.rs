//! `RetrievalEngine`: the two-stage hybrid scorer (C7) orchestrator.

use crate::context::assemble_context;
use crate::scorer::lexical_scores;
use crate::weights::FusionWeights;
use ragweave_common::{RagError, Result, RetrievalHit, RetrievalResult, ScoreComponents, SourceType};
use ragweave_store::ChunkStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

pub struct RetrievalConfig {
    pub default_k: usize,
    pub max_context_tokens: usize,
    pub weights: FusionWeights,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { default_k: 5, max_context_tokens: 4000, weights: FusionWeights::default() }
    }
}

pub struct RetrievalEngine {
    chunk_store: Arc<dyn ChunkStore>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(chunk_store: Arc<dyn ChunkStore>, config: RetrievalConfig) -> Self {
        Self { chunk_store, config }
    }

    /// Runs the hybrid retrieval pipeline for a pre-embedded query vector
    /// and raw query text, honoring `cancellation` between stages.
    #[instrument(skip(self, query_embedding, cancellation))]
    pub async fn retrieve(&self, query_text: &str, query_embedding: &[f32], k: Option<usize>, cancellation: &CancellationToken) -> Result<RetrievalResult> {
        let k = k.unwrap_or(self.config.default_k).max(1);
        let stage_a_k = k.max(50);

        if cancellation.is_cancelled() {
            return Err(RagError::Cancelled);
        }

        let candidates = self.chunk_store.top_k(query_embedding, stage_a_k, None).await?;
        if candidates.is_empty() {
            return Ok(RetrievalResult::default());
        }

        if cancellation.is_cancelled() {
            return Err(RagError::Cancelled);
        }

        let ids: Vec<uuid::Uuid> = candidates.iter().map(|(id, _)| *id).collect();
        let chunks = self.chunk_store.get_chunks(&ids).await?;
        let chunk_by_id: std::collections::HashMap<_, _> = chunks.into_iter().map(|c| (c.id, c)).collect();

        let lexical_input: Vec<(uuid::Uuid, String)> =
            candidates.iter().filter_map(|(id, _)| chunk_by_id.get(id).map(|c| (*id, c.content.clone()))).collect();
        let lexical = lexical_scores(query_text, &lexical_input);

        if cancellation.is_cancelled() {
            return Err(RagError::Cancelled);
        }

        let mut hits: Vec<RetrievalHit> = candidates
            .into_iter()
            .filter_map(|(id, semantic_raw)| {
                let chunk = chunk_by_id.get(&id)?;
                let lexical_score = *lexical.get(&id).unwrap_or(&0.0);
                let semantic = semantic_raw.clamp(0.0, 1.0);
                let fused = self.config.weights.fuse(semantic, lexical_score);
                Some(RetrievalHit {
                    chunk_id: id,
                    document_id: chunk.document_id,
                    chunk_index: chunk.index,
                    content: chunk.content.clone(),
                    score: fused,
                    components: ScoreComponents { semantic, lexical: lexical_score },
                    source_type: SourceType::Document,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(a.document_id.cmp(&b.document_id)).then(a.chunk_index.cmp(&b.chunk_index)));
        hits.truncate(stage_a_k);

        let assembled = assemble_context(hits, k, self.config.max_context_tokens);
        Ok(RetrievalResult { hits: assembled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragweave_common::DocumentChunk;
    use ragweave_store::InMemoryChunkStore;

    async fn seeded_store() -> Arc<dyn ChunkStore> {
        let store = InMemoryChunkStore::new();
        let doc = uuid::Uuid::new_v4();
        let mut c1 = DocumentChunk::new(doc, 0, "the quick brown fox");
        c1.embedding = Some(vec![1.0, 0.0]);
        let mut c2 = DocumentChunk::new(doc, 1, "completely unrelated filler text");
        c2.embedding = Some(vec![0.0, 1.0]);
        store.upsert_chunks(vec![c1, c2]).await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn retrieve_returns_hits_sorted_by_fused_score() {
        let store = seeded_store().await;
        let engine = RetrievalEngine::new(store, RetrievalConfig::default());
        let token = CancellationToken::new();
        let result = engine.retrieve("quick brown fox", &[1.0, 0.0], Some(2), &token).await.unwrap();
        assert!(!result.hits.is_empty());
        for pair in result.hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let store = seeded_store().await;
        let engine = RetrievalEngine::new(store, RetrievalConfig::default());
        let token = CancellationToken::new();
        token.cancel();
        let result = engine.retrieve("quick brown fox", &[1.0, 0.0], Some(2), &token).await;
        assert!(matches!(result, Err(RagError::Cancelled)));
    }
}
