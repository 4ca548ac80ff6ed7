//! Embedding Batcher (C4): turns chunk text into vectors via the
//! Resilient Caller, bounded concurrency, with positional integrity
//! preserved across partial batch failures.

use ragweave_common::ProviderConfig;
use ragweave_provider::ResilientCaller;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    pub per_item_retry_delay_ms: u64,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self { batch_size: 50, max_concurrent_batches: 3, per_item_retry_delay_ms: 250 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchJobStats {
    pub total: usize,
    pub successful: usize,
    pub elapsed_ms: u64,
}

pub struct EmbeddingBatcher {
    caller: Arc<ResilientCaller>,
    provider_config: ProviderConfig,
    config: BatcherConfig,
}

impl EmbeddingBatcher {
    pub fn new(caller: Arc<ResilientCaller>, provider_config: ProviderConfig, config: BatcherConfig) -> Self {
        Self { caller, provider_config, config }
    }

    /// Embeds `texts`, returning a vector the same length as the input.
    /// Entries that could not be embedded — either because their batch
    /// failed and the per-item fallback also failed, or because the text
    /// was empty — come back as `None`, never shifting the positions of
    /// entries around them.
    #[instrument(skip(self, texts), fields(n = texts.len()))]
    pub async fn embed_all(&self, texts: Vec<String>) -> (Vec<Option<Vec<f32>>>, BatchJobStats) {
        let started = std::time::Instant::now();
        let total = texts.len();
        let mut results: Vec<Option<Vec<f32>>> = vec![None; total];
        if total == 0 {
            return (results, BatchJobStats::default());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_batches.max(1)));
        let mut tasks = tokio::task::JoinSet::new();

        for (batch_start, batch_texts) in texts.chunks(self.config.batch_size.max(1)).enumerate() {
            let offset = batch_start * self.config.batch_size.max(1);
            let batch_texts = batch_texts.to_vec();
            let semaphore = semaphore.clone();
            let caller = self.caller.clone();
            let provider_config = self.provider_config.clone();
            let per_item_delay = self.config.per_item_retry_delay_ms;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let vectors = embed_batch_with_fallback(&caller, &provider_config, &batch_texts, per_item_delay).await;
                (offset, vectors)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((offset, vectors)) => {
                    for (i, vector) in vectors.into_iter().enumerate() {
                        if offset + i < results.len() {
                            results[offset + i] = vector;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "embedding batch task panicked"),
            }
        }

        let successful = results.iter().filter(|r| r.is_some()).count();
        let stats = BatchJobStats { total, successful, elapsed_ms: started.elapsed().as_millis() as u64 };
        info!(total = stats.total, successful = stats.successful, elapsed_ms = stats.elapsed_ms, "embedding batch job complete");
        (results, stats)
    }
}

async fn embed_batch_with_fallback(
    caller: &ResilientCaller,
    provider_config: &ProviderConfig,
    texts: &[String],
    per_item_delay_ms: u64,
) -> Vec<Option<Vec<f32>>> {
    match caller.embed_batch(texts, provider_config).await {
        Ok(vectors) if vectors.len() == texts.len() => vectors.into_iter().map(Some).collect(),
        Ok(_) | Err(_) => {
            debug!(n = texts.len(), "batch embedding failed or returned a mismatched length, falling back per item");
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                match caller.embed_batch(std::slice::from_ref(text), provider_config).await {
                    Ok(mut v) if v.len() == 1 => out.push(Some(v.remove(0))),
                    _ => {
                        warn!(text_len = text.len(), "item-level embedding failed, recording empty vector");
                        out.push(None);
                    }
                }
                if per_item_delay_ms > 0 {
                    tokio::time::sleep(std::time::Duration::from_millis(per_item_delay_ms)).await;
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batcher_config_defaults_match_contract() {
        let cfg = BatcherConfig::default();
        assert_eq!(cfg.batch_size, 50);
        assert_eq!(cfg.max_concurrent_batches, 3);
    }

    #[tokio::test]
    async fn embed_all_of_empty_input_returns_empty() {
        let caller = Arc::new(ResilientCaller::new(Arc::new(ragweave_test_utils::FakeProviderAdapter::default())));
        let batcher = EmbeddingBatcher::new(caller, ProviderConfig::default(), BatcherConfig::default());
        let (results, stats) = batcher.embed_all(vec![]).await;
        assert!(results.is_empty());
        assert_eq!(stats.total, 0);
    }
}
