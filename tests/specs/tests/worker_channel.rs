// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker channel for a terminal worker: attach receives history, typed
//! input round-trips through the PTY, and output offsets only increase.

use base64::Engine;

use consolemux::test_support::{spawn_http_server, AppStateBuilder};
use consolemux_specs::{create_quick_session, ws_connect, ws_recv_type, ws_send, RECV_TIMEOUT};

fn decode_data(frame: &serde_json::Value) -> String {
    let encoded = frame["data"].as_str().expect("data field present");
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded).expect("valid base64");
    String::from_utf8_lossy(&bytes).into_owned()
}

#[tokio::test]
async fn attach_then_type_reads_back_output_with_monotonic_offsets() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state.clone()).await?;

    let tmp = std::env::temp_dir();
    let (session_id, worker_id) = create_quick_session(&state.registry, &tmp.to_string_lossy()).await;

    let (mut tx, mut rx) = ws_connect(&addr, &format!("/ws/session/{session_id}/worker/{worker_id}")).await?;

    let history = ws_recv_type(&mut rx, "history", RECV_TIMEOUT).await?;
    let history_offset = history["offset"].as_u64().expect("offset present");
    assert_eq!(history_offset, 0);
    assert_eq!(history["truncated"].as_bool(), Some(false));

    let echoed = base64::engine::general_purpose::STANDARD.encode(b"echo marker\n");
    ws_send(&mut tx, &serde_json::json!({"type": "input", "data": echoed})).await?;

    let mut last_offset = history_offset;
    let mut saw_marker = false;
    for _ in 0..50 {
        let frame = ws_recv_type(&mut rx, "output", RECV_TIMEOUT).await?;
        let offset = frame["offset"].as_u64().expect("offset present");
        assert!(offset >= last_offset, "offsets must never go backward");
        last_offset = offset;
        if decode_data(&frame).contains("marker") {
            saw_marker = true;
            break;
        }
    }
    assert!(saw_marker, "expected to see echoed 'marker' in output stream");

    Ok(())
}

#[tokio::test]
async fn request_history_replays_from_offset_zero() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state.clone()).await?;

    let tmp = std::env::temp_dir();
    let (session_id, worker_id) = create_quick_session(&state.registry, &tmp.to_string_lossy()).await;

    let (mut tx, mut rx) = ws_connect(&addr, &format!("/ws/session/{session_id}/worker/{worker_id}")).await?;
    let _ = ws_recv_type(&mut rx, "history", RECV_TIMEOUT).await?;

    let echoed = base64::engine::general_purpose::STANDARD.encode(b"echo replay-me\n");
    ws_send(&mut tx, &serde_json::json!({"type": "input", "data": echoed})).await?;

    let mut saw_output = false;
    for _ in 0..50 {
        let frame = ws_recv_type(&mut rx, "output", RECV_TIMEOUT).await?;
        if decode_data(&frame).contains("replay-me") {
            saw_output = true;
            break;
        }
    }
    assert!(saw_output);

    ws_send(&mut tx, &serde_json::json!({"type": "request-history", "fromOffset": 0})).await?;
    let replay = ws_recv_type(&mut rx, "history", RECV_TIMEOUT).await?;
    assert!(replay["offset"].as_u64().unwrap_or(0) > 0, "tail offset should have advanced past zero");
    assert!(decode_data(&replay).contains("replay-me"));

    Ok(())
}

#[tokio::test]
async fn attaching_to_an_unknown_worker_gets_worker_not_found_then_close() -> anyhow::Result<()> {
    let state = AppStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state).await?;

    let (_tx, mut rx) = ws_connect(&addr, "/ws/session/ghost-session/worker/ghost-worker").await?;
    let frame = ws_recv_type(&mut rx, "error", RECV_TIMEOUT).await?;
    assert_eq!(frame["code"].as_str(), Some("WORKER_NOT_FOUND"));

    Ok(())
}
