// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport (C7 hub, glue layer): the app channel, the
//! worker channel (dispatched to the PTY or git-diff protocol by worker
//! kind), and a plain `/healthz` ambient endpoint.

pub mod app;
pub mod gitdiff;
pub mod worker;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agents::AgentCatalog;
use crate::config::Config;
use crate::ids::ServerInstanceId;
use crate::model::WorkerType;
use crate::registry::Registry;

/// Shared state handed to every axum handler.
pub struct AppState {
    pub registry: Arc<Registry>,
    pub agents: Arc<AgentCatalog>,
    pub config: Arc<Config>,
    pub server_instance: Arc<ServerInstanceId>,
    pub started_at: Instant,
}

/// Build the axum `Router` with every route the core defines: the app
/// channel, the worker channel (routed by kind), and `/healthz`. Session
/// and agent-definition CRUD are out of this crate's scope (spec §6.2) and
/// are expected to be layered on by whatever embeds this router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws/app", get(app::ws_handler))
        .route("/ws/session/{session_id}/worker/{worker_id}", get(ws_worker_dispatch))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthzResponse {
    status: &'static str,
    server_id: String,
    uptime_seconds: u64,
    session_count: usize,
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (sessions, _) = state.registry.list_with_activity().await;
    Json(HealthzResponse {
        status: "ok",
        server_id: state.server_instance.as_str().to_owned(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        session_count: sessions.len(),
    })
}

/// `/ws/session/{session_id}/worker/{worker_id}` is one path shape shared
/// by two distinct wire protocols (§6.1); dispatch on the worker's kind
/// before upgrading so a `git-diff` worker never sees PTY frames and
/// vice versa.
async fn ws_worker_dispatch(
    State(state): State<Arc<AppState>>,
    path: Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let (session_id, worker_id) = path.0.clone();
    match state.registry.worker_kind(&session_id, &worker_id).await {
        Some(WorkerType::GitDiff) => {
            ws.on_upgrade(move |socket| gitdiff::handle_connection(state, path, socket)).into_response()
        }
        Some(WorkerType::Terminal) | Some(WorkerType::Agent) => {
            ws.on_upgrade(move |socket| worker::handle_connection(state, path, socket)).into_response()
        }
        None => ws
            .on_upgrade(move |socket| worker::handle_connection(state, Path((session_id, worker_id)), socket))
            .into_response(),
    }
}
