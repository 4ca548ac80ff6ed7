//! RAG Synthesizer (C9): prompt construction, citation extraction, and
//! graceful degradation to an extractive answer on persistent LLM failure.

use ragweave_common::{ProviderConfig, RagResponse, RetrievalResult, SearchSource, Session};
use ragweave_provider::ResilientCaller;
use regex::Regex;
use std::sync::Arc;
use std::sync::OnceLock;
use tracing::{instrument, warn};
use uuid::Uuid;

const SYSTEM_PREAMBLE: &str = "Answer strictly using the provided context. If the context is insufficient, say so.";

fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("citation pattern is valid"))
}

pub struct Synthesizer {
    caller: Arc<ResilientCaller>,
    history_budget_turns: usize,
}

impl Synthesizer {
    pub fn new(caller: Arc<ResilientCaller>, history_budget_turns: usize) -> Self {
        Self { caller, history_budget_turns }
    }

    /// Builds the numbered-context prompt the LLM is instructed to cite by.
    fn build_prompt(&self, query: &str, retrieval: &RetrievalResult, history: &Session) -> String {
        let mut prompt = String::new();
        prompt.push_str(SYSTEM_PREAMBLE);
        prompt.push_str("\n\n");

        if !history.messages.is_empty() {
            prompt.push_str("Conversation so far:\n");
            let start = history.messages.len().saturating_sub(self.history_budget_turns);
            for message in &history.messages[start..] {
                prompt.push_str(&format!("{:?}: {}\n", message.role, message.text));
            }
            prompt.push('\n');
        }

        prompt.push_str("Context:\n");
        for (i, hit) in retrieval.hits.iter().enumerate() {
            prompt.push_str(&format!("[{}] {}\n", i + 1, hit.content));
        }

        prompt.push_str(&format!("\nQuestion: {query}\nAnswer, citing context by its [n] identifier:"));
        prompt
    }

    fn extract_citations(answer: &str) -> Vec<usize> {
        citation_pattern().captures_iter(answer).filter_map(|c| c.get(1)?.as_str().parse::<usize>().ok()).collect()
    }

    fn resolve_sources(retrieval: &RetrievalResult, citations: &[usize], file_names: &std::collections::HashMap<Uuid, String>, inferred: bool) -> Vec<SearchSource> {
        citations
            .iter()
            .filter_map(|&n| retrieval.hits.get(n.checked_sub(1)?))
            .map(|hit| SearchSource {
                document_id: hit.document_id,
                file_name: file_names.get(&hit.document_id).cloned().unwrap_or_default(),
                relevant_content: hit.content.clone(),
                relevance_score: hit.score,
                inferred,
                source_type: hit.source_type,
            })
            .collect()
    }

    /// Synthesizes an answer. Degrades to extractive (top-scoring chunk
    /// returned verbatim, `extractive=true`) if the LLM call fails after
    /// every retry/fallback attempt.
    #[instrument(skip(self, retrieval, history, provider_config))]
    pub async fn synthesize(
        &self,
        query: &str,
        retrieval: &RetrievalResult,
        history: &Session,
        session_id: Uuid,
        file_names: &std::collections::HashMap<Uuid, String>,
        provider_config: &ProviderConfig,
    ) -> RagResponse {
        let prompt = self.build_prompt(query, retrieval, history);

        match self.caller.generate_text(&prompt, provider_config).await {
            Ok(answer) => {
                let citations = Self::extract_citations(&answer);
                let sources = if citations.is_empty() && !retrieval.hits.is_empty() {
                    let top_k: Vec<usize> = (1..=retrieval.hits.len()).collect();
                    Self::resolve_sources(retrieval, &top_k, file_names, true)
                } else {
                    Self::resolve_sources(retrieval, &citations, file_names, false)
                };
                RagResponse { query: query.to_string(), answer, sources, session_id, searched_at: chrono::Utc::now(), extractive: false }
            }
            Err(e) => {
                warn!(error = %e, "synthesis failed after retries/fallbacks, degrading to extractive answer");
                extractive_fallback(query, retrieval, session_id, file_names)
            }
        }
    }
}

fn extractive_fallback(query: &str, retrieval: &RetrievalResult, session_id: Uuid, file_names: &std::collections::HashMap<Uuid, String>) -> RagResponse {
    match retrieval.hits.first() {
        Some(top) => RagResponse {
            query: query.to_string(),
            answer: top.content.clone(),
            sources: vec![SearchSource {
                document_id: top.document_id,
                file_name: file_names.get(&top.document_id).cloned().unwrap_or_default(),
                relevant_content: top.content.clone(),
                relevance_score: top.score,
                inferred: true,
                source_type: top.source_type,
            }],
            session_id,
            searched_at: chrono::Utc::now(),
            extractive: true,
        },
        None => RagResponse {
            query: query.to_string(),
            answer: "No relevant context was found to answer this question.".to_string(),
            sources: Vec::new(),
            session_id,
            searched_at: chrono::Utc::now(),
            extractive: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragweave_common::{RetrievalHit, ScoreComponents, SourceType};
    use ragweave_test_utils::FakeProviderAdapter;

    fn sample_retrieval() -> RetrievalResult {
        RetrievalResult {
            hits: vec![RetrievalHit {
                chunk_id: Uuid::new_v4(),
                document_id: Uuid::new_v4(),
                chunk_index: 0,
                content: "the sky is blue".to_string(),
                score: 0.9,
                components: ScoreComponents::default(),
                source_type: SourceType::Document,
            }],
        }
    }

    #[test]
    fn extract_citations_finds_all_bracketed_numbers() {
        let answer = "According to [1] and also [2], the result holds.";
        assert_eq!(Synthesizer::extract_citations(answer), vec![1, 2]);
    }

    #[test]
    fn extract_citations_on_uncited_answer_is_empty() {
        assert!(Synthesizer::extract_citations("no citations here").is_empty());
    }

    #[tokio::test]
    async fn uncited_answer_with_results_attaches_inferred_sources() {
        let caller = Arc::new(ResilientCaller::new(Arc::new(FakeProviderAdapter::with_reply("a plain answer"))));
        let synth = Synthesizer::new(caller, 10);
        let retrieval = sample_retrieval();
        let response = synth.synthesize("what color is the sky", &retrieval, &Session::new(), Uuid::new_v4(), &Default::default(), &ProviderConfig::default()).await;
        assert!(!response.extractive);
        assert!(response.sources.iter().all(|s| s.inferred));
        assert_eq!(response.sources.len(), 1);
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_extractive_answer() {
        let caller = Arc::new(ResilientCaller::new(Arc::new(FakeProviderAdapter::failing(10))).with_retry(ragweave_provider::RetryPolicy::None, 1, 0));
        let synth = Synthesizer::new(caller, 10);
        let retrieval = sample_retrieval();
        let response = synth.synthesize("what color is the sky", &retrieval, &Session::new(), Uuid::new_v4(), &Default::default(), &ProviderConfig::default()).await;
        assert!(response.extractive);
        assert_eq!(response.answer, "the sky is blue");
    }
}
