use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    chat::ChatSession,
    error::{MedsafeError, Result},
    transcript::Transcript,
};

/// A session shared between requests. Holding the lock means a turn is in flight.
pub type SharedSession = Arc<Mutex<ChatSession>>;

/// Trait for keeping live chat sessions addressable by id
#[async_trait]
pub trait ChatSessionStore: Send + Sync {
    /// Register a session and return its id.
    async fn insert(&self, session: ChatSession) -> Result<String>;
    async fn get(&self, id: &str) -> Result<SharedSession>;
    /// Remove a session, waiting for any in-flight turn, and return its transcript.
    async fn close(&self, id: &str) -> Result<Transcript>;
    async fn ids(&self) -> Vec<String>;

    /// Take exclusive use of a session for one turn. Fails fast with
    /// [`MedsafeError::SessionBusy`] while another turn is still sending.
    async fn checkout(&self, id: &str) -> Result<OwnedMutexGuard<ChatSession>> {
        let session = self.get(id).await?;
        session
            .try_lock_owned()
            .map_err(|_| MedsafeError::SessionBusy(id.to_string()))
    }
}

/// In-memory implementation of ChatSessionStore
#[derive(Default)]
pub struct InMemoryChatSessionStore {
    sessions: Arc<DashMap<String, SharedSession>>,
}

impl InMemoryChatSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl ChatSessionStore for InMemoryChatSessionStore {
    async fn insert(&self, session: ChatSession) -> Result<String> {
        let id = session.id().to_string();
        self.sessions.insert(id.clone(), Arc::new(Mutex::new(session)));
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<SharedSession> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| MedsafeError::SessionNotFound(id.to_string()))
    }

    async fn close(&self, id: &str) -> Result<Transcript> {
        let (_, session) = self
            .sessions
            .remove(id)
            .ok_or_else(|| MedsafeError::SessionNotFound(id.to_string()))?;
        let guard = session.lock().await;
        let mut transcript = guard.transcript().clone();
        transcript.commit_turn();
        Ok(transcript)
    }

    async fn ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }
}
