//! Per-invocation context
//!
//! A context is built fresh by the router for every inbound call and moved
//! through the middleware chain into the terminal handler. It is dropped
//! when the call resolves and is never shared between calls.

use crate::error::TransportError;
use crate::session::{Session, UserIdentity};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque identity of the calling window/connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SenderId(String);

impl SenderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Channel back to one specific caller, for out-of-band pushes
pub trait ReplyHandle: Send + Sync {
    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError>;
}

/// Reply handle for calls that have nowhere to push to
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReply;

impl ReplyHandle for NoopReply {
    fn emit(&self, _event: &str, _payload: Value) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct InvocationContext {
    request_id: Uuid,
    channel: String,
    sender: SenderId,
    reply: Arc<dyn ReplyHandle>,
    session: Option<Session>,
    user: Option<UserIdentity>,
    access_token: Option<String>,
    extensions: http::Extensions,
}

impl InvocationContext {
    pub fn new(channel: &str, sender: SenderId, reply: Arc<dyn ReplyHandle>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            channel: channel.to_string(),
            sender,
            reply,
            session: None,
            user: None,
            access_token: None,
            extensions: http::Extensions::new(),
        }
    }

    /// Attach a resolved session; the user identity is derived from it
    pub fn with_session(mut self, session: Session) -> Self {
        self.user = Some(UserIdentity::from(&session));
        self.session = Some(session);
        self
    }

    pub fn with_access_token(mut self, token: String) -> Self {
        self.access_token = Some(token);
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn sender(&self) -> &SenderId {
        &self.sender
    }

    pub fn reply(&self) -> &Arc<dyn ReplyHandle> {
        &self.reply
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    /// Backend token for this sender: the session's own token first,
    /// then whatever the store bound to the sender.
    pub fn access_token(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|s| s.access_token.as_deref())
            .or(self.access_token.as_deref())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Values attached by middleware for downstream stages
    pub fn extensions(&self) -> &http::Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut http::Extensions {
        &mut self.extensions
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tokens stay out of logs
        f.debug_struct("InvocationContext")
            .field("request_id", &self.request_id)
            .field("channel", &self.channel)
            .field("sender", &self.sender)
            .field("user", &self.user)
            .field("has_access_token", &self.access_token().is_some())
            .finish()
    }
}
