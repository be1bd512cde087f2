//! Process-wide session registry.
//!
//! The registry is the only mutable state shared across sessions; every
//! other handle is owned exclusively by its session's tasks.

use std::sync::Arc;

use dashmap::DashMap;

use crate::session::Session;

/// Map from token to active session.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a session under its token, returning the displaced session
    /// if the token was already present.
    pub fn put(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        self.sessions.insert(session.token().to_string(), session)
    }

    /// Looks up the session for a token.
    pub fn get(&self, token: &str) -> Option<Arc<Session>> {
        self.sessions.get(token).map(|entry| Arc::clone(&entry))
    }

    /// Removes the entry for a token, returning it if present.
    pub fn remove(&self, token: &str) -> Option<Arc<Session>> {
        self.sessions.remove(token).map(|(_, session)| session)
    }

    /// Number of active sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true when no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
