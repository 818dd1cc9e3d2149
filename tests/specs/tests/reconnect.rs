// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnecting to a still-running worker resumes its stream from history;
//! restarting an agent worker starts a fresh logical stream at offset zero.

use base64::Engine;

use consolemux::registry::RestartAgentSpec;
use consolemux::test_support::{spawn_http_server, AppStateBuilder};
use consolemux_specs::{create_agent_and_gitdiff_session, ws_connect, ws_recv_type, ws_send, RECV_TIMEOUT};

fn decode_data(frame: &serde_json::Value) -> String {
    let encoded = frame["data"].as_str().expect("data field present");
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded).expect("valid base64");
    String::from_utf8_lossy(&bytes).into_owned()
}

#[tokio::test]
async fn reconnect_resumes_from_history_without_losing_output() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state.clone()).await?;

    let tmp = std::env::temp_dir();
    let (session_id, worker_id, _gitdiff_id) =
        create_agent_and_gitdiff_session(&state.registry, &tmp.to_string_lossy()).await;

    let path = format!("/ws/session/{session_id}/worker/{worker_id}");
    let (mut tx1, mut rx1) = ws_connect(&addr, &path).await?;
    let _ = ws_recv_type(&mut rx1, "history", RECV_TIMEOUT).await?;

    let echoed = base64::engine::general_purpose::STANDARD.encode(b"echo first-conn\n");
    ws_send(&mut tx1, &serde_json::json!({"type": "input", "data": echoed})).await?;
    let mut reached_offset = 0u64;
    loop {
        let frame = ws_recv_type(&mut rx1, "output", RECV_TIMEOUT).await?;
        reached_offset = frame["offset"].as_u64().unwrap_or(0);
        if decode_data(&frame).contains("first-conn") {
            break;
        }
    }
    drop(tx1);
    drop(rx1);

    // A second connection to the same (session, worker) must see the prior
    // output already in history, picking up at or after where the first
    // connection left off — the worker process itself never restarted.
    let (_tx2, mut rx2) = ws_connect(&addr, &path).await?;
    let history = ws_recv_type(&mut rx2, "history", RECV_TIMEOUT).await?;
    assert!(history["offset"].as_u64().unwrap_or(0) >= reached_offset);
    assert!(decode_data(&history).contains("first-conn"));

    Ok(())
}

#[tokio::test]
async fn restarting_an_agent_worker_resets_its_stream_to_offset_zero() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state.clone()).await?;

    let tmp = std::env::temp_dir();
    let (session_id, worker_id, _gitdiff_id) =
        create_agent_and_gitdiff_session(&state.registry, &tmp.to_string_lossy()).await;

    let path = format!("/ws/session/{session_id}/worker/{worker_id}");
    let (mut tx, mut rx) = ws_connect(&addr, &path).await?;
    let first_history = ws_recv_type(&mut rx, "history", RECV_TIMEOUT).await?;
    assert_eq!(first_history["offset"].as_u64(), Some(0));

    let echoed = base64::engine::general_purpose::STANDARD.encode(b"echo before-restart\n");
    ws_send(&mut tx, &serde_json::json!({"type": "input", "data": echoed})).await?;
    loop {
        let frame = ws_recv_type(&mut rx, "output", RECV_TIMEOUT).await?;
        if decode_data(&frame).contains("before-restart") {
            break;
        }
    }
    drop(tx);
    drop(rx);

    state
        .registry
        .restart_agent(
            &session_id,
            &worker_id,
            RestartAgentSpec { agent_id: None, branch: None, continue_conversation: false },
        )
        .await
        .expect("restart succeeds for an agent worker");

    // The worker id is stable across restart, and its rebuilt engine starts
    // a brand-new logical stream back at offset zero.
    let (_tx2, mut rx2) = ws_connect(&addr, &path).await?;
    let post_restart_history = ws_recv_type(&mut rx2, "history", RECV_TIMEOUT).await?;
    assert_eq!(post_restart_history["offset"].as_u64(), Some(0));
    assert!(!decode_data(&post_restart_history).contains("before-restart"));

    Ok(())
}

#[tokio::test]
async fn restarting_a_non_agent_worker_is_rejected() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let tmp = std::env::temp_dir();
    let (session_id, _agent_id, gitdiff_id) =
        create_agent_and_gitdiff_session(&state.registry, &tmp.to_string_lossy()).await;

    let result = state
        .registry
        .restart_agent(
            &session_id,
            &gitdiff_id,
            RestartAgentSpec { agent_id: None, branch: None, continue_conversation: false },
        )
        .await;
    assert!(result.is_err(), "restarting a git-diff worker should fail");

    Ok(())
}
