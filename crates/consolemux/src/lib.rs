// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consolemux: server-side runtime for a multi-user agent console.
//!
//! Owns long-lived PTY processes (terminals and coding agents) plus
//! git-diff workers that expose a session's worktree changes, and fans out
//! their state to browsers over WebSockets.

pub mod activity;
pub mod agents;
pub mod config;
pub mod engine;
pub mod error;
pub mod gitdiff;
pub mod history;
pub mod ids;
pub mod model;
pub mod protocol;
pub mod pty;
pub mod registry;
pub mod screen;
pub mod test_support;
pub mod transport;

use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::agents::AgentCatalog;
use crate::config::Config;
use crate::ids::ServerInstanceId;
use crate::registry::Registry;
use crate::transport::{build_router, AppState};

/// Initialize the `tracing` subscriber from config. Uses `try_init` so it's
/// safe to call more than once (integration tests call it per-process).
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = if std::env::var("RUST_LOG").is_err() && config.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Run the server until shutdown. Binds the HTTP/WebSocket listener,
/// installs a SIGTERM/SIGINT handler that cancels `shutdown` on first
/// signal and force-exits on a second, and serves until the listener is
/// told to stop.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let shutdown = CancellationToken::new();
    let server_instance = Arc::new(ServerInstanceId::fresh());

    let registry = Registry::new(Arc::clone(&config), Arc::clone(&server_instance), shutdown.clone());
    let agents = AgentCatalog::new();

    let state = Arc::new(AppState {
        registry,
        agents,
        config: Arc::clone(&config),
        server_instance: Arc::clone(&server_instance),
        started_at: Instant::now(),
    });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(event = "supervisor.listening", %addr, server_id = %server_instance, "consolemux listening");

    spawn_signal_handler(shutdown.clone());

    let router = build_router(state);
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;
    Ok(())
}

/// Spawn the SIGTERM/SIGINT handler task: first signal cancels `shutdown`
/// for a graceful drain, a second signal force-exits the process.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!(event = "supervisor.shutdown_requested", "shutdown signal received");
        shutdown.cancel();

        wait_for_signal().await;
        error!(event = "supervisor.force_exit", "second shutdown signal received, forcing exit");
        std::process::exit(130);
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();
    tokio::select! {
        _ = async { match &mut sigterm { Some(s) => s.recv().await, None => std::future::pending().await } } => {}
        _ = async { match &mut sigint { Some(s) => s.recv().await, None => std::future::pending().await } } => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
