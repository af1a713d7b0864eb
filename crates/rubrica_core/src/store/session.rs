//! Session token lookup for the relational backend.
//!
//! The login collaborator registers one token per identity; the relational
//! store only reads it.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Resolves the session token bound to a caller identity.
pub trait SessionStore: Send + Sync {
    fn token_for(&self, identity: &str) -> Option<String>;
}

/// Process-local session registry.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `token` to `identity`, replacing any earlier token.
    pub fn register(&self, identity: impl Into<String>, token: impl Into<String>) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.into(), token.into());
    }

    /// Forgets the token bound to `identity`.
    pub fn revoke(&self, identity: &str) -> Option<String> {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity)
    }
}

impl SessionStore for InMemorySessionStore {
    fn token_for(&self, identity: &str) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .filter(|token| !token.trim().is_empty())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemorySessionStore, SessionStore};

    #[test]
    fn register_replace_and_revoke() {
        let sessions = InMemorySessionStore::new();
        assert_eq!(sessions.token_for("mario"), None);

        sessions.register("mario", "t1");
        sessions.register("mario", "t2");
        assert_eq!(sessions.token_for("mario").as_deref(), Some("t2"));

        assert_eq!(sessions.revoke("mario").as_deref(), Some("t2"));
        assert_eq!(sessions.token_for("mario"), None);
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let sessions = InMemorySessionStore::new();
        sessions.register("mario", "  ");
        assert_eq!(sessions.token_for("mario"), None);
    }
}
