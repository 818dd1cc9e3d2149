// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker channel for `terminal`/`agent` workers: path encodes
//! `(sessionId, workerId)` (§4.7). Attaches to the Worker engine, sends a
//! `history` frame immediately, then streams engine frames while dispatching
//! inbound client messages. PTY bytes cross the wire base64-encoded, the
//! same convention the wider example pack uses for binary-in-JSON.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::Path;
use base64::Engine;
use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::warn;

use crate::engine::{EngineError, WorkerFrame, WorkerHandle};
use crate::protocol::{close_code, WorkerClientMessage, WorkerServerMessage};

use super::AppState;

pub async fn handle_connection(state: Arc<AppState>, path: Path<(String, String)>, socket: WebSocket) {
    let (session_id, worker_id) = path.0;

    let handle = match state.registry.attach_worker(&session_id, &worker_id).await {
        Ok(handle) => handle,
        Err(_) => {
            reject(socket, "worker not found").await;
            return;
        }
    };

    let attach = match handle.attach().await {
        Ok(attach) => attach,
        Err(_) => {
            reject(socket, "worker has already exited").await;
            return;
        }
    };

    run(
        state,
        handle,
        socket,
        attach.conn_id,
        attach.frame_rx,
        attach.history,
        attach.pending_bytes,
    )
    .await;
}

/// Send `error(WORKER_NOT_FOUND)` then close with `POLICY_VIOLATION`, per §7.
async fn reject(socket: WebSocket, message: &str) {
    let (mut tx, _rx) = socket.split();
    let frame = WorkerServerMessage::Error {
        message: message.to_owned(),
        code: Some(crate::error::ErrorCode::WorkerNotFound.as_str().to_owned()),
    };
    if let Ok(text) = serde_json::to_string(&frame) {
        let _ = tx.send(Message::Text(text.into())).await;
    }
    let _ = tx
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY_VIOLATION,
            reason: "worker not found".into(),
        })))
        .await;
}

async fn run(
    state: Arc<AppState>,
    handle: WorkerHandle,
    socket: WebSocket,
    conn_id: u64,
    mut frame_rx: tokio::sync::mpsc::Receiver<WorkerFrame>,
    history: WorkerFrame,
    pending_bytes: Arc<AtomicUsize>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let history_size = history.byte_size();
    let history_sent = send_frame(&mut ws_tx, history).await;
    pending_bytes.fetch_sub(history_size, Ordering::AcqRel);
    if history_sent.is_err() {
        handle.detach(conn_id).await;
        return;
    }

    let idle_timeout = state.config.idle_timeout();
    let mut last_activity = tokio::time::Instant::now();

    loop {
        let idle = async {
            match idle_timeout {
                Some(timeout) => tokio::time::sleep_until(last_activity + timeout).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = idle => {
                let _ = ws_tx
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::IDLE_TIMEOUT,
                        reason: "idle timeout".into(),
                    })))
                    .await;
                break;
            }

            frame = frame_rx.recv() => {
                let Some(frame) = frame else { break };
                last_activity = tokio::time::Instant::now();
                if let WorkerFrame::CloseConnection { code } = frame {
                    let _ = ws_tx.send(Message::Close(Some(CloseFrame { code, reason: "".into() }))).await;
                    break;
                }
                let size = frame.byte_size();
                let sent = send_frame(&mut ws_tx, frame).await;
                pending_bytes.fetch_sub(size, Ordering::AcqRel);
                if sent.is_err() {
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_activity = tokio::time::Instant::now();
                        if dispatch_client_message(&state, &handle, &text, &mut ws_tx).await.is_err() {
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
    state: &Arc<AppState>,
    handle: &WorkerHandle,
    text: &str,
    ws_tx: &mut SplitSink<WebSocket, Message>,
) -> Result<(), ()> {
    let Ok(msg) = serde_json::from_str::<WorkerClientMessage>(text) else {
        return send_frame(
            ws_tx,
            WorkerFrame::Error {
                message: "malformed or unknown message".to_owned(),
                code: Some(crate::error::ErrorCode::InvalidMessage),
            },
        )
        .await;
    };

    match msg {
        WorkerClientMessage::Input { data } => {
            if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(&data) {
                handle.input(Bytes::from(bytes)).await;
            }
        }
        WorkerClientMessage::Resize { cols, rows } => handle.resize(cols, rows).await,
        WorkerClientMessage::Image { data, mime_type } => {
            if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(&data) {
                handle.image(bytes, mime_type).await;
            }
        }
        WorkerClientMessage::RequestHistory { from_offset } => {
            return match handle.request_history(from_offset).await {
                Ok(snap) => {
                    send_frame(
                        ws_tx,
                        WorkerFrame::History {
                            data: Bytes::from(snap.bytes),
                            offset: snap.tail_offset,
                            server_id: state.server_instance.as_str().to_owned(),
                            truncated: snap.truncated,
                        },
                    )
                    .await
                }
                Err(err) => send_frame(ws_tx, error_frame(err)).await,
            };
        }
        WorkerClientMessage::UserMessage { content } => handle.user_message(content).await,
        WorkerClientMessage::Cancel {} => {
            if let Err(err) = handle.cancel().await {
                return send_frame(ws_tx, error_frame(err)).await;
            }
        }
        WorkerClientMessage::RequestSdkHistory { last_uuid } => {
            let (messages, last_uuid) = handle.request_sdk_history(last_uuid).await;
            return send_frame(ws_tx, WorkerFrame::MessageHistory { messages, last_uuid }).await;
        }
    }
    Ok(())
}

fn error_frame(err: EngineError) -> WorkerFrame {
    WorkerFrame::Error { message: format!("{:?}", err.code()), code: Some(err.code()) }
}

async fn send_frame(ws_tx: &mut SplitSink<WebSocket, Message>, frame: WorkerFrame) -> Result<(), ()> {
    let Some(msg) = worker_frame_to_message(frame) else { return Ok(()) };
    let text = serde_json::to_string(&msg).map_err(|_| ())?;
    ws_tx.send(Message::Text(text.into())).await.map_err(|_| ())
}

/// Convert an internal engine frame to its wire shape, base64-encoding
/// binary payloads. Returns `None` for the internal `CloseConnection`
/// sentinel, which callers handle separately and never serialize.
fn worker_frame_to_message(frame: WorkerFrame) -> Option<WorkerServerMessage> {
    let encode = |b: &[u8]| base64::engine::general_purpose::STANDARD.encode(b);
    Some(match frame {
        WorkerFrame::History { data, offset, server_id, truncated } => {
            WorkerServerMessage::History { data: encode(&data), offset, server_id, truncated }
        }
        WorkerFrame::Output { data, offset } => WorkerServerMessage::Output { data: encode(&data), offset },
        WorkerFrame::Activity { state } => WorkerServerMessage::Activity { state },
        WorkerFrame::Exit { exit_code, signal } => WorkerServerMessage::Exit { exit_code, signal },
        WorkerFrame::Error { message, code } => {
            WorkerServerMessage::Error { message, code: code.map(|c| c.as_str().to_owned()) }
        }
        WorkerFrame::SdkMessage { message } => WorkerServerMessage::SdkMessage { message },
        WorkerFrame::MessageHistory { messages, last_uuid } => {
            WorkerServerMessage::MessageHistory { messages, last_uuid }
        }
        WorkerFrame::ServerRestarted { server_pid } => WorkerServerMessage::ServerRestarted { server_pid },
        WorkerFrame::CloseConnection { .. } => {
            warn!(event = "transport.worker.unexpected_close_frame", "CloseConnection reached serializer");
            return None;
        }
    })
}
