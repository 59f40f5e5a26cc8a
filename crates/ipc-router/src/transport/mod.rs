//! Transport boundary
//!
//! A transport delivers inbound calls for a channel to exactly one listener
//! and carries the listener's result (or error) back to the caller. The
//! router installs one listener per registered channel and never talks to
//! the wire itself.

pub mod memory;
pub mod stdio;

pub use memory::{MemoryTransport, RecordingReply};
pub use stdio::{StdioTransport, WireEvent, WireRequest, WireResponse};

use crate::context::{ReplyHandle, SenderId};
use crate::error::{IpcError, IpcResult, TransportError};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// One inbound call as delivered by a transport
pub struct InboundCall {
    pub sender: SenderId,
    pub reply: Arc<dyn ReplyHandle>,
    pub args: Value,
}

/// Listener installed for a single channel
pub type Listener = Arc<dyn Fn(InboundCall) -> BoxFuture<'static, IpcResult> + Send + Sync>;

pub trait Transport: Send + Sync {
    /// Install the listener for `channel`. A channel has at most one.
    fn handle(&self, channel: &str, listener: Listener) -> Result<(), TransportError>;
}

/// Error for calls on channels nobody listens to
pub fn unknown_channel(channel: &str) -> IpcError {
    IpcError::new(
        "UNKNOWN_CHANNEL",
        &format!("No handler registered for channel: {}", channel),
    )
}

/// Channel → listener map shared by the bundled transports
#[derive(Clone, Default)]
pub struct ListenerTable {
    inner: Arc<RwLock<HashMap<String, Listener>>>,
}

impl ListenerTable {
    pub fn install(&self, channel: &str, listener: Listener) -> Result<(), TransportError> {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if guard.contains_key(channel) {
            return Err(TransportError::ListenerExists(channel.to_string()));
        }
        guard.insert(channel.to_string(), listener);
        Ok(())
    }

    pub fn get(&self, channel: &str) -> Option<Listener> {
        self.inner.read().ok()?.get(channel).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|g| g.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
