//! In-process transport
//!
//! Delivers calls by direct function invocation. Used by the host for
//! developer tooling and by tests that need a transport without a wire.

use super::{unknown_channel, InboundCall, Listener, ListenerTable, Transport};
use crate::context::{NoopReply, ReplyHandle, SenderId};
use crate::error::{IpcResult, TransportError};
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MemoryTransport {
    listeners: ListenerTable,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke `channel` as `sender`, discarding pushed events
    pub async fn call(&self, channel: &str, sender: SenderId, args: Value) -> IpcResult {
        self.call_with_reply(channel, sender, Arc::new(NoopReply), args)
            .await
    }

    pub async fn call_with_reply(
        &self,
        channel: &str,
        sender: SenderId,
        reply: Arc<dyn ReplyHandle>,
        args: Value,
    ) -> IpcResult {
        let listener = self
            .listeners
            .get(channel)
            .ok_or_else(|| unknown_channel(channel))?;
        listener(InboundCall {
            sender,
            reply,
            args,
        })
        .await
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Transport for MemoryTransport {
    fn handle(&self, channel: &str, listener: Listener) -> Result<(), TransportError> {
        self.listeners.install(channel, listener)
    }
}

/// Reply handle that keeps every pushed event
#[derive(Debug, Default)]
pub struct RecordingReply {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingReply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.events
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }
}

impl ReplyHandle for RecordingReply {
    fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        let mut guard = self.events.lock().map_err(|_| TransportError::Closed)?;
        guard.push((event.to_string(), payload));
        Ok(())
    }
}
