//! App routes
//!
//! Handles: app:ping, app:info

use crate::config;
use ipc_router::{handler_fn, layers, IpcRouter, RegistryError, RouteDescriptor};
use serde_json::json;

pub fn register(router: &mut IpcRouter) -> Result<(), RegistryError> {
    let mws = [layers::logging()];

    router.register(
        RouteDescriptor::from_channel("app:ping")?,
        &mws,
        handler_fn(|_ctx, _args| async move {
            Ok(json!({ "pong": true, "at": chrono::Utc::now().to_rfc3339() }))
        }),
    )?;

    router.register(
        RouteDescriptor::from_channel("app:info")?,
        &mws,
        handler_fn(|_ctx, _args| async move {
            Ok(json!({
                "name": config::app_name(),
                "slug": config::app_slug(),
                "identifier": config::app_identifier(),
                "version": env!("CARGO_PKG_VERSION"),
            }))
        }),
    )?;

    Ok(())
}
