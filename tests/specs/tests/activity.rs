// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity promotion: terminal output that matches an agent's
//! `askingPatterns` is classified `asking`, and that transition reaches
//! both the worker channel and the app channel's aggregated view.

use std::time::Duration;

use base64::Engine;

use consolemux::test_support::{spawn_http_server, AppStateBuilder};
use consolemux_specs::{create_agent_and_gitdiff_session, ws_connect, ws_recv_type, ws_send, RECV_TIMEOUT};

#[tokio::test]
async fn output_ending_in_a_question_mark_promotes_to_asking() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state.clone()).await?;

    let tmp = std::env::temp_dir();
    let (session_id, worker_id, _gitdiff_id) =
        create_agent_and_gitdiff_session(&state.registry, &tmp.to_string_lossy()).await;

    let (mut tx, mut rx) =
        ws_connect(&addr, &format!("/ws/session/{session_id}/worker/{worker_id}")).await?;
    let _ = ws_recv_type(&mut rx, "history", RECV_TIMEOUT).await?;

    let prompt = base64::engine::general_purpose::STANDARD.encode(b"printf 'Continue?'\n");
    ws_send(&mut tx, &serde_json::json!({"type": "input", "data": prompt})).await?;

    let activity = ws_recv_type(&mut rx, "activity", Duration::from_secs(5)).await?;
    assert_eq!(activity["state"].as_str(), Some("asking"));

    Ok(())
}

#[tokio::test]
async fn aggregate_activity_on_the_app_channel_prefers_asking() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state.clone()).await?;

    let tmp = std::env::temp_dir();
    let (session_id, worker_id, _gitdiff_id) =
        create_agent_and_gitdiff_session(&state.registry, &tmp.to_string_lossy()).await;

    // Attach the worker channel first so the engine actually spawns; the
    // app channel only reports activity for workers that have been started.
    let (mut worker_tx, mut worker_rx) =
        ws_connect(&addr, &format!("/ws/session/{session_id}/worker/{worker_id}")).await?;
    let _ = ws_recv_type(&mut worker_rx, "history", RECV_TIMEOUT).await?;

    let (_app_tx, mut app_rx) = ws_connect(&addr, "/ws/app").await?;
    let _ = ws_recv_type(&mut app_rx, "sessions-sync", RECV_TIMEOUT).await?;
    let _ = ws_recv_type(&mut app_rx, "agents-sync", RECV_TIMEOUT).await?;

    let prompt = base64::engine::general_purpose::STANDARD.encode(b"printf 'Pick one?'\n");
    ws_send(&mut worker_tx, &serde_json::json!({"type": "input", "data": prompt})).await?;

    let event = ws_recv_type(&mut app_rx, "worker-activity", Duration::from_secs(5)).await?;
    assert_eq!(event["workerId"].as_str(), Some(worker_id.as_str()));
    assert_eq!(event["activityState"].as_str(), Some("asking"));

    Ok(())
}
