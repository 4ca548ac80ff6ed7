//! ragweave-retrieval — the hybrid retrieval engine (C7): semantic +
//! lexical scoring, fusion, and context-window assembly.

pub mod context;
pub mod engine;
pub mod scorer;
pub mod weights;

pub use context::assemble_context;
pub use engine::{RetrievalConfig, RetrievalEngine};
pub use weights::FusionWeights;
