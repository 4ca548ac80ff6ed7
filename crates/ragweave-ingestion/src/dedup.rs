//! Exact content-hash deduplication for the Document Registry (C6).

use sha2::{Digest, Sha256};

/// Result of a deduplication check against an owner's existing documents.
#[derive(Debug, PartialEq, Eq)]
pub enum DedupResult {
    /// No existing document shares this content hash — proceed with ingestion.
    New,
    /// An existing document already has this exact content.
    Duplicate { document_id: uuid::Uuid },
}

/// SHA-256 hash of raw document bytes, hex-encoded. Two uploads of
/// byte-identical content within the same owner's namespace hash equal;
/// this is deliberately exact-match only, not the donor's SimHash
/// near-duplicate approximation.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Checks a freshly computed hash against an existing document's hash
/// for the same owner, returning `Duplicate` on an exact match.
pub fn check_duplicate(hash: &str, existing: Option<(uuid::Uuid, &str)>) -> DedupResult {
    match existing {
        Some((document_id, existing_hash)) if existing_hash == hash => DedupResult::Duplicate { document_id },
        _ => DedupResult::New,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_hash_equal() {
        let a = content_hash(b"hello world");
        let b = content_hash(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_hash_different() {
        assert_ne!(content_hash(b"hello"), content_hash(b"world"));
    }

    #[test]
    fn matching_existing_hash_is_duplicate() {
        let id = uuid::Uuid::new_v4();
        let hash = content_hash(b"some content");
        let result = check_duplicate(&hash, Some((id, &hash)));
        assert_eq!(result, DedupResult::Duplicate { document_id: id });
    }

    #[test]
    fn no_existing_record_is_new() {
        let hash = content_hash(b"some content");
        assert_eq!(check_duplicate(&hash, None), DedupResult::New);
    }
}
