//! Context-window assembly: deduplicates per-document contribution and
//! interleaves across documents to maximize source diversity, then caps
//! the result at a token budget.

use ragweave_common::RetrievalHit;
use std::collections::HashMap;

fn approx_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Assembles a context window from already score-sorted `hits`. A single
/// document may contribute at most `ceil(k / 2)` chunks; beyond that its
/// remaining hits are dropped so other documents get a chance to appear.
/// Remaining hits are then interleaved round-robin across documents,
/// preserving each document's internal score order, and truncated once
/// `max_context_tokens` would be exceeded.
pub fn assemble_context(hits: Vec<RetrievalHit>, k: usize, max_context_tokens: usize) -> Vec<RetrievalHit> {
    if hits.is_empty() || k == 0 {
        return Vec::new();
    }
    let per_document_cap = k.div_ceil(2).max(1);

    let mut by_document: Vec<(uuid::Uuid, Vec<RetrievalHit>)> = Vec::new();
    for hit in hits {
        match by_document.iter_mut().find(|(doc_id, _)| *doc_id == hit.document_id) {
            Some((_, bucket)) => bucket.push(hit),
            None => by_document.push((hit.document_id, vec![hit])),
        }
    }
    for (_, bucket) in &mut by_document {
        bucket.truncate(per_document_cap);
    }

    let mut assembled = Vec::new();
    let mut token_budget = 0usize;
    let mut cursor = 0usize;
    loop {
        let mut progressed = false;
        for (_, bucket) in &mut by_document {
            if bucket.is_empty() {
                continue;
            }
            progressed = true;
            let hit = bucket.remove(0);
            let cost = approx_tokens(&hit.content);
            if token_budget + cost > max_context_tokens && !assembled.is_empty() {
                return assembled;
            }
            token_budget += cost;
            assembled.push(hit);
            if assembled.len() >= k {
                return assembled;
            }
        }
        if !progressed {
            break;
        }
        cursor += 1;
        if cursor > k * 4 {
            break;
        }
    }

    assembled
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragweave_common::ScoreComponents;
    use uuid::Uuid;

    fn hit(document_id: uuid::Uuid, index: i64, score: f64, content: &str) -> RetrievalHit {
        RetrievalHit {
            chunk_id: Uuid::new_v4(),
            document_id,
            chunk_index: index,
            content: content.to_string(),
            score,
            components: ScoreComponents::default(),
            source_type: Default::default(),
        }
    }

    #[test]
    fn single_document_is_capped_at_half_k() {
        let doc = Uuid::new_v4();
        let hits = (0..5).map(|i| hit(doc, i, 1.0 - i as f64 * 0.01, "word ")).collect();
        let assembled = assemble_context(hits, 4, 10_000);
        assert_eq!(assembled.len(), 2);
    }

    #[test]
    fn interleaves_across_documents() {
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        let hits = vec![hit(doc_a, 0, 0.9, "a0"), hit(doc_a, 1, 0.8, "a1"), hit(doc_b, 0, 0.7, "b0")];
        let assembled = assemble_context(hits, 3, 10_000);
        assert_eq!(assembled.len(), 3);
        assert_eq!(assembled[0].document_id, doc_a);
        assert_eq!(assembled[1].document_id, doc_b);
    }

    #[test]
    fn stops_once_token_budget_would_be_exceeded() {
        let doc = Uuid::new_v4();
        let hits = vec![hit(doc, 0, 0.9, "one two three"), hit(doc, 1, 0.8, "four five six")];
        let assembled = assemble_context(hits, 2, 3);
        assert_eq!(assembled.len(), 1);
    }
}
