//! Query intent classification for the Query Router.

use std::collections::HashSet;

/// Dispatch target for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Chat,
    DocumentRag,
    DatabaseQuery,
    ExternalTool,
    Mixed,
}

/// Minimum fused retrieval score for a query to be considered "answerable"
/// from documents rather than falling back to chat.
pub const RETRIEVAL_THRESHOLD: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    New,
    Reset,
    Clear,
}

impl SessionControl {
    pub fn parse(query: &str) -> Option<Self> {
        match query.trim() {
            "/new" => Some(SessionControl::New),
            "/reset" => Some(SessionControl::Reset),
            "/clear" => Some(SessionControl::Clear),
            _ => None,
        }
    }
}

/// Describes a registered external tool well enough to score a query
/// against it without calling out to the tool itself.
pub struct ToolDescriptor {
    pub name: String,
    pub keywords: Vec<String>,
}

/// Everything the router needs to know about the environment to apply
/// the deterministic rules before falling back to an LLM classification.
pub struct RouterContext<'a> {
    pub has_documents: bool,
    pub database_schema_terms: &'a [String],
    pub tools: &'a [ToolDescriptor],
}

/// Applies the deterministic rule table from the router's contract, in
/// priority order. Every query resolves to a concrete `Intent` —
/// `DocumentRag` is the bottom rule, so the LLM classification fallback
/// in `QueryRouter::route` is only reached for session-control parsing,
/// which this classifier doesn't handle at all.
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn classify_deterministic(&self, query: &str, ctx: &RouterContext<'_>) -> Option<Intent> {
        if !ctx.has_documents && ctx.database_schema_terms.is_empty() {
            return Some(Intent::Chat);
        }

        let lowered = query.to_lowercase();

        if ctx.database_schema_terms.iter().any(|t| lowered.contains(&t.to_lowercase())) {
            return Some(Intent::DatabaseQuery);
        }

        let matches_tool = ctx.tools.iter().any(|tool| {
            lowered.contains(&tool.name.to_lowercase())
                || tool.keywords.iter().any(|k| lowered.contains(&k.to_lowercase()))
        });
        if matches_tool {
            return Some(Intent::Mixed);
        }

        Some(Intent::DocumentRag)
    }

    /// Determines whether a fused retrieval score clears the "above
    /// threshold" bar used to decide between `DocumentRag` and `Chat`.
    pub fn is_above_threshold(&self, top_score: f64) -> bool {
        top_score >= RETRIEVAL_THRESHOLD
    }

    /// Heuristic continuation detector: short queries, or queries made up
    /// mostly of pronouns/determiners, are treated as continuing the
    /// previous non-chat turn rather than starting a fresh retrieval.
    pub fn looks_like_continuation(&self, query: &str) -> bool {
        const CONTINUATION_WORDS: &[&str] = &[
            "it", "that", "this", "they", "them", "those", "these", "he", "she",
            "more", "also", "and", "what about", "why", "how about",
        ];
        let trimmed = query.trim();
        let word_count = trimmed.split_whitespace().count();
        if word_count == 0 {
            return false;
        }
        if word_count <= 4 {
            return true;
        }
        let lowered = trimmed.to_lowercase();
        let first_words: HashSet<&str> = lowered.split_whitespace().take(3).collect();
        CONTINUATION_WORDS.iter().any(|w| first_words.contains(w))
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_control_parses_known_commands() {
        assert_eq!(SessionControl::parse("/new"), Some(SessionControl::New));
        assert_eq!(SessionControl::parse("/reset"), Some(SessionControl::Reset));
        assert_eq!(SessionControl::parse(" /clear "), Some(SessionControl::Clear));
        assert_eq!(SessionControl::parse("/nope"), None);
    }

    #[test]
    fn no_documents_and_no_databases_routes_to_chat() {
        let clf = IntentClassifier::default();
        let ctx = RouterContext { has_documents: false, database_schema_terms: &[], tools: &[] };
        assert_eq!(clf.classify_deterministic("what is KRAS?", &ctx), Some(Intent::Chat));
    }

    #[test]
    fn schema_term_routes_to_database_query() {
        let clf = IntentClassifier::default();
        let schema_terms = vec!["customers".to_string(), "orders".to_string()];
        let ctx = RouterContext { has_documents: true, database_schema_terms: &schema_terms, tools: &[] };
        assert_eq!(clf.classify_deterministic("how many rows in customers table", &ctx), Some(Intent::DatabaseQuery));
    }

    #[test]
    fn tool_keyword_match_routes_to_mixed() {
        let clf = IntentClassifier::default();
        let tools = vec![ToolDescriptor { name: "weather".to_string(), keywords: vec!["forecast".to_string()] }];
        let ctx = RouterContext { has_documents: true, database_schema_terms: &[], tools: &tools };
        assert_eq!(clf.classify_deterministic("what's the forecast tomorrow", &ctx), Some(Intent::Mixed));
    }

    #[test]
    fn ambiguous_query_resolves_to_document_rag() {
        let clf = IntentClassifier::default();
        let ctx = RouterContext { has_documents: true, database_schema_terms: &[], tools: &[] };
        assert_eq!(clf.classify_deterministic("summarize the uploaded report", &ctx), Some(Intent::DocumentRag));
    }

    #[test]
    fn short_query_is_treated_as_continuation() {
        let clf = IntentClassifier::default();
        assert!(clf.looks_like_continuation("what about it"));
        assert!(!clf.looks_like_continuation("explain the full pharmacokinetic profile of the compound"));
    }

    #[test]
    fn threshold_boundary() {
        let clf = IntentClassifier::default();
        assert!(clf.is_above_threshold(0.25));
        assert!(!clf.is_above_threshold(0.249));
    }
}
