//! The `ConversationStore` contract: per-session append-only message log,
//! bounded by turn count and token budget, pruned oldest-first.

use async_trait::async_trait;
use ragweave_common::{RagError, Session, SessionMessage};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::Mutex;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, RagError>;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_session(&self) -> Result<Uuid>;
    /// Appends a message, pruning oldest-first down to `max_turns` /
    /// `max_tokens` afterward.
    async fn append(&self, session_id: Uuid, message: SessionMessage, max_turns: usize, max_tokens: usize) -> Result<()>;
    async fn history(&self, session_id: Uuid) -> Result<Vec<SessionMessage>>;
    async fn reset(&self, session_id: Uuid) -> Result<Uuid>;
}

fn approx_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Serializes access per session: the outer lock protects the map shape
/// (insert/remove), the inner per-session `Mutex` serializes writers to
/// one session's log.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Mutex<Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn prune(session: &mut Session, max_turns: usize, max_tokens: usize) {
        while session.messages.len() > max_turns {
            session.messages.remove(0);
        }
        let mut total: usize = session.messages.iter().map(|m| approx_tokens(&m.text)).sum();
        while total > max_tokens && !session.messages.is_empty() {
            let removed = session.messages.remove(0);
            total -= approx_tokens(&removed.text);
        }
    }
}

#[async_trait]
impl ConversationStore for InMemorySessionStore {
    async fn create_session(&self) -> Result<Uuid> {
        let session = Session::new();
        let id = session.id;
        self.sessions.write().unwrap().insert(id, Mutex::new(session));
        Ok(id)
    }

    async fn append(&self, session_id: Uuid, message: SessionMessage, max_turns: usize, max_tokens: usize) -> Result<()> {
        let needs_create = !self.sessions.read().unwrap().contains_key(&session_id);
        if needs_create {
            let mut session = Session::new();
            session.id = session_id;
            self.sessions.write().unwrap().insert(session_id, Mutex::new(session));
        }

        let guard = self.sessions.read().unwrap();
        let session_lock = guard.get(&session_id).ok_or_else(|| RagError::NotFound(session_id.to_string()))?;
        let mut session = session_lock.lock().await;
        session.messages.push(message);
        Self::prune(&mut session, max_turns, max_tokens);
        Ok(())
    }

    async fn history(&self, session_id: Uuid) -> Result<Vec<SessionMessage>> {
        let guard = self.sessions.read().unwrap();
        match guard.get(&session_id) {
            Some(lock) => Ok(lock.lock().await.messages.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn reset(&self, session_id: Uuid) -> Result<Uuid> {
        self.sessions.write().unwrap().remove(&session_id);
        self.create_session().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragweave_common::Role;

    #[tokio::test]
    async fn append_creates_session_implicitly() {
        let store = InMemorySessionStore::new();
        let id = Uuid::new_v4();
        store.append(id, SessionMessage::new(Role::User, "hi"), 50, 4000).await.unwrap();
        assert_eq!(store.history(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn prunes_oldest_first_past_max_turns() {
        let store = InMemorySessionStore::new();
        let id = store.create_session().await.unwrap();
        for i in 0..5 {
            store.append(id, SessionMessage::new(Role::User, format!("turn {i}")), 3, 4000).await.unwrap();
        }
        let history = store.history(id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].text, "turn 2");
        assert_eq!(history[2].text, "turn 4");
    }

    #[tokio::test]
    async fn reset_returns_a_fresh_session_id_and_clears_history() {
        let store = InMemorySessionStore::new();
        let id = store.create_session().await.unwrap();
        store.append(id, SessionMessage::new(Role::User, "hello"), 50, 4000).await.unwrap();
        let new_id = store.reset(id).await.unwrap();
        assert_ne!(new_id, id);
        assert!(store.history(new_id).await.unwrap().is_empty());
    }
}
