//! Deterministic sentence-aware document chunker (C3).

/// Config for splitting a document's raw text into chunks.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { max_chunk_size: 1000, min_chunk_size: 100, chunk_overlap: 200 }
    }
}

/// Splits `text` on `.`, `!`, `?` into sentences, keeping the terminator.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim().to_string();
            if !trimmed.is_empty() {
                sentences.push(trimmed);
            }
            current.clear();
        }
    }
    let trailing = current.trim().to_string();
    if !trailing.is_empty() {
        sentences.push(trailing);
    }
    sentences
}

fn ensure_terminated(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.ends_with(['.', '!', '?']) {
        trimmed.to_string()
    } else {
        format!("{trimmed}.")
    }
}

/// Greedily accumulates sentences into a buffer, emitting a chunk when
/// adding the next sentence would exceed `max_chunk_size`. Each new
/// chunk is seeded with an overlap suffix of the previous chunk's tail.
/// The trailing buffer is always emitted, even below `min_chunk_size`.
pub fn chunk_text(text: &str, config: &ChunkerConfig) -> Vec<String> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut buffer = String::new();

    for sentence in sentences {
        let candidate_len = if buffer.is_empty() { sentence.len() } else { buffer.len() + 1 + sentence.len() };

        if !buffer.is_empty() && candidate_len > config.max_chunk_size {
            chunks.push(ensure_terminated(&buffer));
            let overlap = tail_overlap(&buffer, config.chunk_overlap);
            buffer = overlap;
        }

        if buffer.is_empty() {
            buffer = sentence;
        } else {
            buffer.push(' ');
            buffer.push_str(&sentence);
        }
    }

    if !buffer.is_empty() {
        chunks.push(ensure_terminated(&buffer));
    }

    chunks
}

/// Takes the last `overlap` characters of `text`, not splitting a word.
fn tail_overlap(text: &str, overlap: usize) -> String {
    if overlap == 0 || text.is_empty() {
        return String::new();
    }
    let start = text.len().saturating_sub(overlap);
    let boundary = (start..text.len()).find(|&i| text.is_char_boundary(i)).unwrap_or(text.len());
    let mut tail = &text[boundary..];
    if let Some(space_idx) = tail.find(' ') {
        tail = &tail[space_idx + 1..];
    }
    tail.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determinism() {
        let text = "The cat sat. The dog ran. The bird flew. It was sunny.";
        let config = ChunkerConfig::default();
        assert_eq!(chunk_text(text, &config), chunk_text(text, &config));
    }

    #[test]
    fn short_text_yields_single_chunk_below_min_size() {
        let text = "Hi.";
        let chunks = chunk_text(text, &ChunkerConfig::default());
        assert_eq!(chunks, vec!["Hi.".to_string()]);
    }

    #[test]
    fn overlap_prefix_appears_in_next_chunk() {
        let text = "S1. S2. S3. S4.";
        let config = ChunkerConfig { max_chunk_size: 10, min_chunk_size: 2, chunk_overlap: 3 };
        let chunks = chunk_text(text, &config);
        assert!(chunks.len() >= 2, "expected at least 2 chunks, got {chunks:?}");
        let tail_of_first = &chunks[0][chunks[0].len().saturating_sub(3)..];
        assert!(
            chunks[1].contains(tail_of_first.trim_start()),
            "chunk 2 ({}) should contain the tail of chunk 1 ({})",
            chunks[1],
            chunks[0]
        );
    }

    #[test]
    fn every_chunk_is_terminated_with_punctuation() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let config = ChunkerConfig { max_chunk_size: 15, min_chunk_size: 5, chunk_overlap: 3 };
        let chunks = chunk_text(text, &config);
        for c in &chunks {
            assert!(c.ends_with(['.', '!', '?']), "chunk not terminated: {c}");
        }
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", &ChunkerConfig::default()).is_empty());
    }
}
