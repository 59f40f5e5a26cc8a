//! Clinic Desktop main process - Entry Point
//!
//! # Startup Order
//!
//! 1. Load `.env.local` and initialize tracing (stderr only)
//! 2. Build the session store and the router over the stdio transport
//! 3. Register route modules
//! 4. Either regenerate the preload types (`generate-types [root]`) and
//!    exit, or serve the UI process on stdin/stdout until EOF
//!
//! # Design Constraints
//!
//! - stdout belongs to the IPC protocol; nothing else may write to it
//! - Route registration failures are fatal at startup

mod config;
mod routes;
mod session_store;

use ipc_router::{GeneratorConfig, IpcRouter, StdioTransport};
use session_store::MemorySessionStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ==========================================================================
    // PHASE 1: TRACING INITIALIZATION
    // ==========================================================================
    if dotenvy::from_filename(".env.local").is_err() {
        let _ = dotenvy::from_filename("../.env.local");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_desktop=info".parse()?)
                .add_directive("ipc_router=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    tracing::info!(
        op = "desktop.startup",
        app = config::app_name(),
        version = env!("CARGO_PKG_VERSION"),
        "Clinic Desktop starting"
    );

    // ==========================================================================
    // PHASE 2: ROUTER
    // ==========================================================================
    let sessions = Arc::new(MemorySessionStore::new(config::session_ttl()));
    let transport = Arc::new(StdioTransport::new());
    let mut router = IpcRouter::new(transport.clone()).with_session_store(sessions.clone());

    routes::register_all(&mut router, sessions.clone())?;

    // ==========================================================================
    // PHASE 3: GENERATE OR SERVE
    // ==========================================================================
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("generate-types") => {
            let root = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
            let written = router.generate_preload_types(&GeneratorConfig::under(&root))?;
            tracing::info!(
                op = "desktop.generate_types",
                types = %written.types_path.display(),
                tree = %written.tree_path.display(),
                "Preload types written"
            );
            return Ok(());
        }
        Some(other) => anyhow::bail!("Unknown command: {} (expected 'generate-types [root]')", other),
        None => {}
    }

    let purger = sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            purger.purge_expired();
        }
    });

    tracing::info!(op = "desktop.serve", routes = router.len(), "Serving IPC on stdio");
    transport.serve_stdio().await?;
    tracing::info!(
        op = "desktop.shutdown",
        open_sessions = sessions.len(),
        "stdin closed, shutting down"
    );

    Ok(())
}
