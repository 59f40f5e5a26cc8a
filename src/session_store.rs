//! In-memory session store
//!
//! Sessions live only as long as the process. Tokens are 32 random bytes,
//! hex encoded. Backend access tokens are bound per sender (window) and
//! resolved by the router on every call from that sender.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use ipc_router::{SenderId, Session, SessionStore};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::RwLock;

/// Session token size in bytes (256 bits)
const TOKEN_SIZE: usize = 32;

pub struct MemorySessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
    access_tokens: RwLock<HashMap<SenderId, String>>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
            access_tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Mint a new session for `user_id`
    pub fn create(
        &self,
        user_id: &str,
        display_name: Option<String>,
        roles: Vec<String>,
        access_token: Option<String>,
    ) -> Session {
        let now = Utc::now();
        let session = Session {
            token: new_token(),
            user_id: user_id.to_string(),
            display_name,
            roles,
            access_token,
            created_at: now,
            expires_at: now + self.ttl,
        };

        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.token.clone(), session.clone());

        tracing::info!(
            op = "session.create",
            user_id = %session.user_id,
            expires_at = %session.expires_at.to_rfc3339(),
            "Session created"
        );
        session
    }

    /// Drop a session. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token);

        if let Some(session) = &removed {
            tracing::info!(op = "session.revoke", user_id = %session.user_id, "Session revoked");
        }
        removed.is_some()
    }

    pub fn bind_access_token(&self, sender: &SenderId, access_token: String) {
        self.access_tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(sender.clone(), access_token);
    }

    pub fn unbind_access_token(&self, sender: &SenderId) {
        self.access_tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(sender);
    }

    /// Remove expired sessions, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let mut guard = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = guard.len();
        guard.retain(|_, session| !session.is_expired());
        let purged = before - guard.len();

        if purged > 0 {
            tracing::debug!(op = "session.purge", purged, "Expired sessions purged");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn lookup(&self, token: &str) -> Option<Session> {
        let session = self
            .sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(token)
            .cloned()?;
        if session.is_expired() {
            None
        } else {
            Some(session)
        }
    }

    async fn resolve_access_token(&self, sender: &SenderId) -> Option<String> {
        self.access_tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(sender)
            .cloned()
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
