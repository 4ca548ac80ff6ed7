//! ragweave-store — pluggable persistence for documents, chunks, and
//! conversation sessions.
//!
//! Ships two concrete `ChunkStore` backends: an in-memory one for tests
//! and small deployments, and a LanceDB-backed one for embedded vector
//! search. `ConversationStore` mirrors the same split.

pub mod chunk_store;
pub mod chunks;
pub mod conversation;
pub mod database;
pub mod documents;
pub mod error;
pub mod schema;
pub mod schema_arrow;

pub use chunk_store::{ChunkStore, InMemoryChunkStore};
pub use chunks::LanceChunkStore;
pub use conversation::{ConversationStore, InMemorySessionStore};
pub use database::{Database, DatabaseStats};
pub use documents::DocumentRepository;
pub use error::{Result, StoreError};
pub use schema::{TABLE_CHUNKS, TABLE_DOCUMENTS};
