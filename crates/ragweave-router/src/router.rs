//! Query Router — selects an `Intent` for an incoming query, applying
//! deterministic rules first and falling back to an LLM classification
//! prompt only when those rules don't fire.

use crate::classification::{Intent, IntentClassifier, RouterContext, SessionControl};
use ragweave_common::{ProviderConfig, RagError};
use ragweave_provider::ResilientCaller;
use std::sync::Arc;

const CLASSIFICATION_SYSTEM_PROMPT: &str = "You are a routing assistant. Given a user query, \
respond with exactly one word: Chat, DocumentRag, DatabaseQuery, or ExternalTool. No other text.";

pub enum RouteOutcome {
    SessionControl(SessionControl),
    Intent(Intent),
}

pub struct QueryRouter {
    classifier: IntentClassifier,
    caller: Arc<ResilientCaller>,
    provider_config: ProviderConfig,
}

impl QueryRouter {
    pub fn new(caller: Arc<ResilientCaller>, provider_config: ProviderConfig) -> Self {
        Self { classifier: IntentClassifier::default(), caller, provider_config }
    }

    /// Routes a query to an intent, consulting the LLM only when the
    /// deterministic rules produce no answer.
    pub async fn route(&self, query: &str, ctx: &RouterContext<'_>) -> Result<RouteOutcome, RagError> {
        if let Some(cmd) = SessionControl::parse(query) {
            return Ok(RouteOutcome::SessionControl(cmd));
        }

        if let Some(intent) = self.classifier.classify_deterministic(query, ctx) {
            return Ok(RouteOutcome::Intent(intent));
        }

        let intent = self.classify_with_llm(query).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "LLM classification fallback failed, defaulting to DocumentRag");
            Intent::DocumentRag
        });
        Ok(RouteOutcome::Intent(intent))
    }

    async fn classify_with_llm(&self, query: &str) -> Result<Intent, RagError> {
        let prompt = format!("{CLASSIFICATION_SYSTEM_PROMPT}\n\nQuery: {query}");
        let response = self.caller.generate_text(&prompt, &self.provider_config).await?;
        Ok(parse_intent_response(&response))
    }

    pub fn above_threshold(&self, top_score: f64) -> bool {
        self.classifier.is_above_threshold(top_score)
    }

    pub fn looks_like_continuation(&self, query: &str) -> bool {
        self.classifier.looks_like_continuation(query)
    }
}

fn parse_intent_response(text: &str) -> Intent {
    let normalized = text.trim().to_lowercase();
    if normalized.contains("databasequery") || normalized.contains("database") {
        Intent::DatabaseQuery
    } else if normalized.contains("externaltool") || normalized.contains("tool") {
        Intent::ExternalTool
    } else if normalized.contains("documentrag") || normalized.contains("document") {
        Intent::DocumentRag
    } else {
        Intent::Chat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_intent_words_case_insensitively() {
        assert_eq!(parse_intent_response("DocumentRag"), Intent::DocumentRag);
        assert_eq!(parse_intent_response(" databasequery \n"), Intent::DatabaseQuery);
        assert_eq!(parse_intent_response("ExternalTool"), Intent::ExternalTool);
    }

    #[test]
    fn unrecognized_response_defaults_to_chat() {
        assert_eq!(parse_intent_response("I'm not sure"), Intent::Chat);
    }
}
