//! ragweave-synth — the RAG Synthesizer (C9): prompt construction,
//! citation-backed answer generation, and an extractive fallback path.

pub mod synthesizer;

pub use synthesizer::Synthesizer;
