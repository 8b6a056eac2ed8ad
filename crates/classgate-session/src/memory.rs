//! The in-memory session store.
//!
//! Sessions live in a `HashMap` behind a tokio `RwLock`: many requests can
//! read at once, writes take turns. Nothing survives a restart, which is
//! what you want in tests and rarely what you want in production.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::{now_millis, Session, SessionError, SessionId, SessionStore};

/// A [`SessionStore`] that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    /// All sessions, keyed by id. Expired entries linger until
    /// [`expire_stale`](SessionStore::expire_stale) runs, but `get`
    /// hides them.
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if there are no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
        let now = now_millis();
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(id)
            .filter(|session| !session.is_expired_at(now))
            .cloned())
    }

    async fn set(&self, session: &Session) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), SessionError> {
        if self.sessions.write().await.remove(id).is_some() {
            tracing::debug!(sid = %id, "session destroyed");
        }
        Ok(())
    }

    async fn expire_stale(&self) -> Result<usize, SessionError> {
        let now = now_millis();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        // `retain` keeps only entries where the closure returns `true`.
        sessions.retain(|_, session| !session.is_expired_at(now));
        Ok(before - sessions.len())
    }
}

// =========================================================================
// Tests
// =========================================================================
