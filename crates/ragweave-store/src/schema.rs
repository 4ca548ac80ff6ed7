//! Table names for the LanceDB-backed store. Row shapes are the shared
//! `ragweave_common::domain::{Document, DocumentChunk}` types; see
//! `schema_arrow` for the Arrow conversion.

pub const TABLE_DOCUMENTS: &str = "documents";
pub const TABLE_CHUNKS: &str = "chunks";
