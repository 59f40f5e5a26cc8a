//! Route modules
//!
//! Each module registers its own channels.

pub mod app;
pub mod auth;
pub mod ipc;

use crate::session_store::MemorySessionStore;
use ipc_router::{IpcError, IpcRouter, RegistryError};
use serde_json::Value;
use std::sync::Arc;

pub fn register_all(router: &mut IpcRouter, sessions: Arc<MemorySessionStore>) -> Result<(), RegistryError> {
    app::register(router)?;
    auth::register(router, sessions)?;
    ipc::register(router)?;

    tracing::info!(op = "routes.ready", routes = router.len(), "Route modules registered");
    Ok(())
}

/// Payload object of a call. Variadic calls carry it as their first element.
pub(crate) fn payload(args: &Value) -> &Value {
    match args {
        Value::Array(items) => items.first().unwrap_or(&Value::Null),
        other => other,
    }
}

/// Required non-empty string field
pub(crate) fn required_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str, IpcError> {
    match payload.get(field).and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(IpcError::invalid_payload(&format!("Missing or empty '{}'", field))),
    }
}

/// Optional string field, empty treated as absent
pub(crate) fn optional_str<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}
