// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box test harness: drives a real in-process `consolemux` server
//! over genuine WebSocket connections, the way a browser would.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use consolemux::model::{AgentCapabilities, AgentDefinition, ActivityPatterns, SessionType};
use consolemux::registry::{AgentWorkerSpec, CreateSessionSpec, Registry};

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
pub type WsTx = futures_util::stream::SplitSink<WsStream, WsMessage>;
pub type WsRx = futures_util::stream::SplitStream<WsStream>;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Send a JSON message over the WebSocket.
pub async fn ws_send(stream: &mut WsTx, value: &serde_json::Value) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    stream.send(WsMessage::Text(text.into())).await.map_err(|e| anyhow::anyhow!("ws send: {e}"))?;
    Ok(())
}

/// Receive a JSON message from the WebSocket, failing after `timeout`.
pub async fn ws_recv(stream: &mut WsRx, timeout: Duration) -> anyhow::Result<serde_json::Value> {
    let msg = tokio::time::timeout(timeout, stream.next())
        .await
        .map_err(|_| anyhow::anyhow!("ws recv timeout"))?
        .ok_or_else(|| anyhow::anyhow!("ws stream closed"))?
        .map_err(|e| anyhow::anyhow!("ws recv: {e}"))?;

    match msg {
        WsMessage::Text(text) => Ok(serde_json::from_str(&text)?),
        other => anyhow::bail!("expected a Text frame, got {other:?}"),
    }
}

/// Keep receiving frames until one matches `want` (by `type`) or `timeout`
/// elapses, skipping any other frame types in between.
pub async fn ws_recv_type(
    stream: &mut WsRx,
    want: &str,
    timeout: Duration,
) -> anyhow::Result<serde_json::Value> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        anyhow::ensure!(remaining > Duration::ZERO, "timed out waiting for frame type '{want}'");
        let value = ws_recv(stream, remaining).await?;
        if value.get("type").and_then(|t| t.as_str()) == Some(want) {
            return Ok(value);
        }
    }
}

/// Connect a WebSocket client to `path` on the running server.
pub async fn ws_connect(addr: &std::net::SocketAddr, path: &str) -> anyhow::Result<(WsTx, WsRx)> {
    let url = format!("ws://{addr}{path}");
    let (stream, _) =
        tokio_tungstenite::connect_async(&url).await.map_err(|e| anyhow::anyhow!("ws connect: {e}"))?;
    Ok(stream.split())
}

/// An agent definition whose worker is a plain shell, so tests can drive it
/// with ordinary POSIX commands instead of a real coding-agent binary.
pub fn shell_agent_definition(id: &str) -> AgentDefinition {
    AgentDefinition {
        id: id.to_owned(),
        name: "shell-agent".to_owned(),
        command_template: "/bin/sh".to_owned(),
        continue_template: None,
        headless_template: None,
        activity_patterns: ActivityPatterns { asking_patterns: vec![r"\?\s*$".to_owned()] },
        agent_type: Some("shell".to_owned()),
        capabilities: AgentCapabilities {
            supports_continue: true,
            supports_headless_mode: false,
            supports_activity_detection: true,
        },
    }
}

/// Create a quick session in `registry` with a terminal worker at
/// `location_path`, returning the session and its terminal worker id.
pub async fn create_quick_session(registry: &Registry, location_path: &str) -> (String, String) {
    let session = registry
        .create(CreateSessionSpec {
            kind: SessionType::Quick,
            location_path: location_path.to_owned(),
            repository_id: None,
            worktree_id: None,
            title: None,
            initial_prompt: None,
            agent: None,
            include_terminal: true,
            include_git_diff: false,
        })
        .await;
    let worker_id = session.workers.first().cloned().expect("terminal worker present");
    (session.id, worker_id)
}

/// Create a session with both an agent worker (backed by `/bin/sh`) and a
/// git-diff worker rooted at `location_path`.
pub async fn create_agent_and_gitdiff_session(
    registry: &Registry,
    location_path: &str,
) -> (String, String, String) {
    let session = registry
        .create(CreateSessionSpec {
            kind: SessionType::Worktree,
            location_path: location_path.to_owned(),
            repository_id: None,
            worktree_id: None,
            title: None,
            initial_prompt: None,
            agent: Some(AgentWorkerSpec { definition: shell_agent_definition("shell-agent-1"), use_sdk: false }),
            include_terminal: false,
            include_git_diff: true,
        })
        .await;

    // `create` inserts the agent worker first (if present) and the git-diff
    // worker last.
    let agent_id = session.workers.first().cloned().expect("agent worker present");
    let gitdiff_id = session.workers.last().cloned().expect("git-diff worker present");
    (session.id, agent_id, gitdiff_id)
}
