//! In-memory session registry.

use super::types::TradingSession;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Shared handle to one session. Holding the lock serializes every mutation
/// of that session; other sessions stay independent.
pub type SessionHandle = Arc<Mutex<TradingSession>>;

/// Registry of live trading sessions keyed by session id.
///
/// Sessions live for the lifetime of the store and are never persisted.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and return its handle.
    pub fn insert(&self, session: TradingSession) -> SessionHandle {
        let id = session.session_id.clone();
        let handle = Arc::new(Mutex::new(session));
        let mut sessions = match self.sessions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.insert(id, handle.clone());
        handle
    }

    /// Handle for a session, or [`Error::SessionNotFound`].
    pub fn handle(&self, session_id: &str) -> Result<SessionHandle> {
        let sessions = match self.sessions.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.handle(session_id).is_ok()
    }

    /// Ids of every registered session, sorted.
    pub fn ids(&self) -> Vec<String> {
        let sessions = match self.sessions.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        match self.sessions.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of a session's current state.
    pub async fn snapshot(&self, session_id: &str) -> Result<TradingSession> {
        let handle = self.handle(session_id)?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    /// Copies of every session owned by `user_id`, oldest first.
    pub async fn user_sessions(&self, user_id: &str) -> Vec<TradingSession> {
        let handles: Vec<SessionHandle> = {
            let sessions = match self.sessions.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            sessions.values().cloned().collect()
        };

        let mut owned = Vec::new();
        for handle in handles {
            let session = handle.lock().await;
            if session.user_id == user_id {
                owned.push(session.clone());
            }
        }
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        owned
    }
}
