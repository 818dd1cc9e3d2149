// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The app channel: initial sync on connect, fan-out of registry events to
//! every connected browser, and idempotent `request-sync`.

use std::time::Duration;

use consolemux::test_support::{spawn_http_server, AppStateBuilder};
use consolemux_specs::{create_quick_session, ws_connect, ws_recv, ws_recv_type, ws_send, RECV_TIMEOUT};

#[tokio::test]
async fn connect_receives_sessions_sync_then_agents_sync() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state).await?;

    let (_tx, mut rx) = ws_connect(&addr, "/ws/app").await?;

    let first = ws_recv(&mut rx, RECV_TIMEOUT).await?;
    assert_eq!(first.get("type").and_then(|t| t.as_str()), Some("sessions-sync"));
    assert_eq!(first["sessions"].as_array().map(Vec::len), Some(0));

    let second = ws_recv(&mut rx, RECV_TIMEOUT).await?;
    assert_eq!(second.get("type").and_then(|t| t.as_str()), Some("agents-sync"));

    Ok(())
}

#[tokio::test]
async fn session_created_fans_out_to_every_connected_client() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state.clone()).await?;

    let (_tx_a, mut rx_a) = ws_connect(&addr, "/ws/app").await?;
    let (_tx_b, mut rx_b) = ws_connect(&addr, "/ws/app").await?;

    // Drain each client's initial sync pair.
    let _ = ws_recv(&mut rx_a, RECV_TIMEOUT).await?;
    let _ = ws_recv(&mut rx_a, RECV_TIMEOUT).await?;
    let _ = ws_recv(&mut rx_b, RECV_TIMEOUT).await?;
    let _ = ws_recv(&mut rx_b, RECV_TIMEOUT).await?;

    let tmp = std::env::temp_dir();
    let (session_id, _worker_id) = create_quick_session(&state.registry, &tmp.to_string_lossy()).await;

    let event_a = ws_recv_type(&mut rx_a, "session-created", RECV_TIMEOUT).await?;
    assert_eq!(event_a["session"]["id"].as_str(), Some(session_id.as_str()));

    let event_b = ws_recv_type(&mut rx_b, "session-created", RECV_TIMEOUT).await?;
    assert_eq!(event_b["session"]["id"].as_str(), Some(session_id.as_str()));

    Ok(())
}

#[tokio::test]
async fn request_sync_is_idempotent_and_reflects_current_state() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state.clone()).await?;

    let tmp = std::env::temp_dir();
    let (session_id, _worker_id) = create_quick_session(&state.registry, &tmp.to_string_lossy()).await;

    let (mut tx, mut rx) = ws_connect(&addr, "/ws/app").await?;
    let first = ws_recv(&mut rx, RECV_TIMEOUT).await?;
    assert_eq!(first["sessions"].as_array().map(Vec::len), Some(1));
    let _ = ws_recv(&mut rx, RECV_TIMEOUT).await?; // agents-sync

    // Sending `request-sync` twice in a row must not error, and each
    // response must describe the same, unchanged set of sessions.
    ws_send(&mut tx, &serde_json::json!({"type": "request-sync"})).await?;
    let resync_one = ws_recv_type(&mut rx, "sessions-sync", RECV_TIMEOUT).await?;
    assert_eq!(resync_one["sessions"][0]["id"].as_str(), Some(session_id.as_str()));

    ws_send(&mut tx, &serde_json::json!({"type": "request-sync"})).await?;
    let resync_two = ws_recv_type(&mut rx, "sessions-sync", RECV_TIMEOUT).await?;
    assert_eq!(resync_two["sessions"], resync_one["sessions"]);

    Ok(())
}

#[tokio::test]
async fn unrelated_client_does_not_see_traffic_after_disconnect() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state.clone()).await?;

    let (tx, rx) = ws_connect(&addr, "/ws/app").await?;
    drop(tx);
    drop(rx);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The registry must not panic or hang after a client disconnects mid-sync.
    let tmp = std::env::temp_dir();
    let (_session_id, _worker_id) = create_quick_session(&state.registry, &tmp.to_string_lossy()).await;
    Ok(())
}
