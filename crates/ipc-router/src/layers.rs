//! Built-in middleware
//!
//! All of these are opt-in; routes pick them per registration.

use crate::error::IpcError;
use crate::middleware::{middleware_fn, Middleware};
use std::time::{Duration, Instant};

/// Log entry, exit and elapsed time of every call
pub fn logging() -> Middleware {
    middleware_fn(|ctx, args, next| async move {
        let channel = ctx.channel().to_string();
        let request_id = ctx.request_id();
        let sender = ctx.sender().to_string();
        let started = Instant::now();

        tracing::info!(
            op = "ipc.call.start",
            channel = %channel,
            request_id = %request_id,
            sender = %sender,
            "Call started"
        );

        let result = next.run(ctx, args).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => tracing::info!(
                op = "ipc.call.complete",
                channel = %channel,
                request_id = %request_id,
                elapsed_ms,
                "Call complete"
            ),
            Err(e) => tracing::warn!(
                op = "ipc.call.failed",
                channel = %channel,
                request_id = %request_id,
                elapsed_ms,
                code = %e.code,
                "Call failed"
            ),
        }

        result
    })
}

/// Reject calls whose context carries no session
pub fn require_session() -> Middleware {
    middleware_fn(|ctx, args, next| async move {
        if !ctx.is_authenticated() {
            tracing::debug!(op = "ipc.call.rejected", channel = %ctx.channel(), "No session on call");
            return Err(IpcError::not_authenticated());
        }
        next.run(ctx, args).await
    })
}

/// Fail with `TIMEOUT` when the rest of the chain takes longer than `limit`.
///
/// The abandoned future is dropped, so work past its next await point
/// does not run.
pub fn timeout(limit: Duration) -> Middleware {
    middleware_fn(move |ctx, args, next| async move {
        let channel = ctx.channel().to_string();
        match tokio::time::timeout(limit, next.run(ctx, args)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    op = "ipc.call.timeout",
                    channel = %channel,
                    limit_ms = limit.as_millis() as u64,
                    "Call timed out"
                );
                Err(IpcError::new(
                    "TIMEOUT",
                    &format!("Call on {} exceeded {} ms", channel, limit.as_millis()),
                )
                .with_status(504))
            }
        }
    })
}
