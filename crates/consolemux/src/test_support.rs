// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test-only helpers for spinning up an in-process server, shared by this
//! crate's own integration tests and the `tests/specs` black-box crate.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::agents::AgentCatalog;
use crate::config::Config;
use crate::ids::ServerInstanceId;
use crate::registry::Registry;
use crate::transport::{build_router, AppState};

/// Build an [`AppState`] wired the same way [`crate::run`] does, but with a
/// fresh in-memory registry and no bound listener — callers attach it to a
/// `TcpListener` themselves via [`spawn_http_server`].
pub struct AppStateBuilder {
    config: Config,
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self { config: test_config() }
    }
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Arc<AppState> {
        let config = Arc::new(self.config);
        let shutdown = CancellationToken::new();
        let server_instance = Arc::new(ServerInstanceId::fresh());
        let registry = Registry::new(Arc::clone(&config), Arc::clone(&server_instance), shutdown);
        Arc::new(AppState {
            registry,
            agents: AgentCatalog::new(),
            config,
            server_instance,
            started_at: Instant::now(),
        })
    }
}

/// A [`Config`] with every timing knob tight enough for fast tests but
/// every cap left at its production default unless the test overrides it.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_owned(),
        port: 0,
        history_cap_bytes: crate::history::DEFAULT_CAP_BYTES,
        send_queue_frames: 256,
        send_queue_bytes: 4 * 1024 * 1024,
        idle_timeout_seconds: 600,
        activity_debounce_ms: 20,
        active_window_ms: 200,
        pty_write_buffer_bytes: 64 * 1024,
        sync_debounce_ms: 10,
        gitdiff_poll_ms: 50,
        log_format: "text".to_owned(),
        log_level: "warn".to_owned(),
    }
}

/// Spawn an HTTP/WebSocket server on a random localhost port for
/// integration testing. Returns the bound address, the `AppState` (so
/// tests can also drive the registry directly), and a join handle for the
/// server task.
pub async fn spawn_http_server(
    state: Arc<AppState>,
) -> anyhow::Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
    let router = build_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((addr, handle))
}
