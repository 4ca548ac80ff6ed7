//! Stage B lexical scoring and score-fusion/normalisation helpers for the
//! hybrid retrieval engine.

use crate::weights::FusionWeights;
use std::collections::HashMap;

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase().split_whitespace().map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string()).filter(|w| !w.is_empty()).collect()
}

/// Approximate inverse document frequency over the retrieved candidate
/// pool (not the full corpus — Stage B only ever sees Stage A's
/// candidates, so IDF is computed relative to that smaller pool).
fn document_frequencies<'a>(candidate_tokens: impl Iterator<Item = &'a [String]>) -> HashMap<String, usize> {
    let mut df: HashMap<String, usize> = HashMap::new();
    for tokens in candidate_tokens {
        let mut seen = std::collections::HashSet::new();
        for t in tokens {
            if seen.insert(t.clone()) {
                *df.entry(t.clone()).or_insert(0) += 1;
            }
        }
    }
    df
}

/// Raw (unnormalized) lexical score for one candidate: IDF-weighted
/// token overlap with the query, plus a bonus when the query appears as
/// a contiguous phrase in the candidate (multi-word queries only).
pub fn lexical_score(query: &str, candidate: &str, df: &HashMap<String, usize>, pool_size: usize) -> f64 {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return 0.0;
    }
    let candidate_tokens = tokenize(candidate);
    let candidate_set: std::collections::HashSet<&String> = candidate_tokens.iter().collect();

    let mut score = 0.0;
    for qt in &query_tokens {
        if candidate_set.contains(qt) {
            let df_t = *df.get(qt).unwrap_or(&1) as f64;
            let idf = ((pool_size as f64 + 1.0) / df_t).ln() + 1.0;
            score += idf;
        }
    }

    if query_tokens.len() > 1 {
        let query_phrase = query_tokens.join(" ");
        let candidate_lower = candidate.to_lowercase();
        if candidate_lower.contains(&query_phrase) {
            score += query_tokens.len() as f64 * 0.5;
        }
    }

    score
}

/// Scores every candidate's lexical overlap against `query`, returning
/// scores normalized to `[0, 1]` by the pool maximum (0 if every score
/// is 0).
pub fn lexical_scores(query: &str, candidates: &[(uuid::Uuid, String)]) -> HashMap<uuid::Uuid, f64> {
    let tokenized: Vec<Vec<String>> = candidates.iter().map(|(_, text)| tokenize(text)).collect();
    let df = document_frequencies(tokenized.iter().map(|v| v.as_slice()));
    let pool_size = candidates.len();

    let raw: HashMap<uuid::Uuid, f64> = candidates.iter().map(|(id, text)| (*id, lexical_score(query, text, &df, pool_size))).collect();

    let max = raw.values().cloned().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return raw.into_iter().map(|(id, _)| (id, 0.0)).collect();
    }
    raw.into_iter().map(|(id, v)| (id, v / max)).collect()
}

/// Normalizes a set of cosine similarities (already in roughly `[-1, 1]`)
/// into `[0, 1]` by clamping negative values to 0 — cosine similarity
/// against a unit-embedded query rarely goes negative in practice, but
/// the clamp keeps the fused score well-defined regardless.
pub fn normalise_semantic(raw: f64) -> f64 {
    raw.clamp(0.0, 1.0)
}

pub fn fuse_scores(semantic: f64, lexical: f64, weights: &FusionWeights) -> f64 {
    weights.fuse(normalise_semantic(semantic), lexical.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn exact_phrase_match_scores_higher_than_partial_overlap() {
        let candidates = vec![
            (Uuid::new_v4(), "the quick brown fox jumps".to_string()),
            (Uuid::new_v4(), "quick thinking and a brown hat".to_string()),
        ];
        let scores = lexical_scores("quick brown fox", &candidates);
        assert!(scores[&candidates[0].0] > scores[&candidates[1].0]);
    }

    #[test]
    fn no_overlap_scores_zero() {
        let candidates = vec![(Uuid::new_v4(), "completely unrelated text".to_string())];
        let scores = lexical_scores("zzz yyy xxx", &candidates);
        assert_eq!(scores[&candidates[0].0], 0.0);
    }

    #[test]
    fn fuse_scores_respects_weights() {
        let weights = FusionWeights::default();
        let fused = fuse_scores(1.0, 0.0, &weights);
        assert!((fused - 0.8).abs() < 1e-9);
    }
}
