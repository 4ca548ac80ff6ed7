//! Shared test fixtures for the ragweave workspace: a deterministic fake
//! provider adapter and a handful of sample-data builders, so individual
//! crates don't each reinvent them.

use async_trait::async_trait;
use ragweave_common::{Document, DocumentChunk, ProviderConfig, RagError, Result, Role, Session, SessionMessage};
use ragweave_provider::{ProviderAdapter, ProviderKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A provider adapter that never touches the network. `generate_text`
/// echoes the prompt back wrapped in a fixed reply unless a canned
/// response was queued; `embed_one`/`embed_batch` produce short
/// deterministic vectors derived from text length, so tests can assert
/// on specific values without randomness.
pub struct FakeProviderAdapter {
    pub canned_replies: Mutex<Vec<String>>,
    pub fail_next_n_calls: AtomicUsize,
    pub embedding_dim: usize,
}

impl Default for FakeProviderAdapter {
    fn default() -> Self {
        Self { canned_replies: Mutex::new(Vec::new()), fail_next_n_calls: AtomicUsize::new(0), embedding_dim: 8 }
    }
}

impl FakeProviderAdapter {
    pub fn with_reply(reply: impl Into<String>) -> Self {
        let adapter = Self::default();
        adapter.canned_replies.lock().unwrap().push(reply.into());
        adapter
    }

    pub fn failing(n: usize) -> Self {
        let adapter = Self::default();
        adapter.fail_next_n_calls.store(n, Ordering::SeqCst);
        adapter
    }

    fn maybe_fail(&self) -> Result<()> {
        let remaining = self.fail_next_n_calls.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_n_calls.store(remaining - 1, Ordering::SeqCst);
            return Err(RagError::ProviderHttp { status: 503, body: "fake provider injected failure".to_string() });
        }
        Ok(())
    }

    fn fake_embedding(&self, text: &str) -> Vec<f32> {
        let len = text.len() as f32;
        (0..self.embedding_dim).map(|i| (len + i as f32) / 100.0).collect()
    }
}

#[async_trait]
impl ProviderAdapter for FakeProviderAdapter {
    async fn generate_text(&self, prompt: &str, _config: &ProviderConfig) -> Result<String> {
        self.maybe_fail()?;
        let mut replies = self.canned_replies.lock().unwrap();
        if !replies.is_empty() {
            return Ok(replies.remove(0));
        }
        Ok(format!("fake reply to: {prompt}"))
    }

    async fn embed_one(&self, text: &str, _config: &ProviderConfig) -> Result<Vec<f32>> {
        self.maybe_fail()?;
        Ok(self.fake_embedding(text))
    }

    async fn embed_batch(&self, texts: &[String], _config: &ProviderConfig) -> Result<Vec<Vec<f32>>> {
        self.maybe_fail()?;
        Ok(texts.iter().map(|t| self.fake_embedding(t)).collect())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Custom
    }
}

pub fn sample_document(owner_id: &str, file_name: &str) -> Document {
    Document::new(owner_id, file_name, "text/plain", format!("hash-of-{file_name}"))
}

pub fn sample_chunk(document_id: uuid::Uuid, index: i64, content: &str) -> DocumentChunk {
    DocumentChunk::new(document_id, index, content)
}

pub fn sample_session_with_turns(turns: &[(Role, &str)]) -> Session {
    let mut session = Session::new();
    for (role, text) in turns {
        session.messages.push(SessionMessage::new(*role, *text));
    }
    session
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_adapter_echoes_canned_reply_once() {
        let adapter = FakeProviderAdapter::with_reply("canned");
        let out = adapter.generate_text("irrelevant", &ProviderConfig::default()).await.unwrap();
        assert_eq!(out, "canned");
        let out2 = adapter.generate_text("irrelevant", &ProviderConfig::default()).await.unwrap();
        assert!(out2.starts_with("fake reply to:"));
    }

    #[tokio::test]
    async fn fake_adapter_fails_the_configured_number_of_times() {
        let adapter = FakeProviderAdapter::failing(2);
        assert!(adapter.generate_text("a", &ProviderConfig::default()).await.is_err());
        assert!(adapter.generate_text("a", &ProviderConfig::default()).await.is_err());
        assert!(adapter.generate_text("a", &ProviderConfig::default()).await.is_ok());
    }

    #[tokio::test]
    async fn embed_batch_is_positional_and_deterministic() {
        let adapter = FakeProviderAdapter::default();
        let texts = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let out = adapter.embed_batch(&texts, &ProviderConfig::default()).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_ne!(out[0], out[1]);
    }
}
