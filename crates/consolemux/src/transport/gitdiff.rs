// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker channel for `git-diff` workers: same path shape as the PTY
//! worker channel, a distinct wire protocol (§6.1 "Git-diff worker channel").

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::Path;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use crate::gitdiff::{GitDiffFrame, GitDiffHandle};
use crate::protocol::{close_code, GitDiffClientMessage, GitDiffData, GitDiffServerMessage};

use super::AppState;

pub async fn handle_connection(state: Arc<AppState>, path: Path<(String, String)>, socket: WebSocket) {
    let (session_id, worker_id) = path.0;

    let handle = match state.registry.attach_gitdiff_worker(&session_id, &worker_id).await {
        Ok(handle) => handle,
        Err(_) => {
            reject(socket).await;
            return;
        }
    };

    let Some((conn_id, frame_rx, cached)) = handle.attach().await else {
        reject(socket).await;
        return;
    };

    run(handle, socket, conn_id, frame_rx, cached).await;
}

async fn reject(socket: WebSocket) {
    let (mut tx, _rx) = socket.split();
    let _ = tx
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY_VIOLATION,
            reason: "worker not found".into(),
        })))
        .await;
}

async fn run(
    handle: GitDiffHandle,
    socket: WebSocket,
    conn_id: u64,
    mut frame_rx: tokio::sync::mpsc::Receiver<GitDiffFrame>,
    cached: Option<crate::gitdiff::DiffResult>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    if let Some(result) = cached {
        if send_frame(&mut ws_tx, GitDiffFrame::Data { summary: result.summary, raw_diff: result.raw_diff }).await.is_err() {
            handle.detach(conn_id).await;
            return;
        }
    }

    loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                let Some(frame) = frame else { break };
                if send_frame(&mut ws_tx, frame).await.is_err() {
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if dispatch_client_message(&handle, &text, &mut ws_tx).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    handle.detach(conn_id).await;
}

async fn dispatch_client_message(
    handle: &GitDiffHandle,
    text: &str,
    ws_tx: &mut SplitSink<WebSocket, Message>,
) -> Result<(), ()> {
    let Ok(msg) = serde_json::from_str::<GitDiffClientMessage>(text) else { return Ok(()) };
    match msg {
        GitDiffClientMessage::Refresh {} => handle.refresh().await,
        GitDiffClientMessage::SetBaseCommit { git_ref } => {
            let _ = handle.set_base_commit(git_ref).await;
        }
        GitDiffClientMessage::SetTargetCommit { target } => handle.set_target_commit(target).await,
        GitDiffClientMessage::RequestExpand { path, start_line, end_line } => {
            if let Some(expanded) = handle.request_expand(path, start_line, end_line).await {
                let msg = GitDiffServerMessage::ExpandedLines {
                    path: expanded.path,
                    start_line: expanded.start_line,
                    lines: expanded.lines,
                };
                let text = serde_json::to_string(&msg).map_err(|_| ())?;
                ws_tx.send(Message::Text(text.into())).await.map_err(|_| ())?;
            }
        }
    }
    Ok(())
}

async fn send_frame(ws_tx: &mut SplitSink<WebSocket, Message>, frame: GitDiffFrame) -> Result<(), ()> {
    let msg = match frame {
        GitDiffFrame::Data { summary, raw_diff } => {
            GitDiffServerMessage::DiffData { data: GitDiffData { summary, raw_diff } }
        }
        GitDiffFrame::Error { message } => GitDiffServerMessage::DiffError { error: message },
    };
    let text = serde_json::to_string(&msg).map_err(|_| ())?;
    ws_tx.send(Message::Text(text.into())).await.map_err(|_| ())
}
