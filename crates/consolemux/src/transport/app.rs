// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! App channel (`/ws/app`): one per browser tab. Streams registry and agent
//! catalog events and answers `request-sync` with a debounced `sessions-sync`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::agents::AgentCatalogEvent;
use crate::protocol::AppServerMessage;
use crate::registry::RegistryEvent;

use super::AppState;

pub async fn ws_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(state, socket))
}

async fn handle_connection(state: Arc<AppState>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut registry_rx = state.registry.subscribe();
    let mut agent_rx = state.agents.subscribe();

    if send_initial_sync(&mut ws_tx, &state).await.is_err() {
        return;
    }

    let mut debounce_deadline: Option<tokio::time::Instant> = None;

    loop {
        let debounce = async {
            match debounce_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = debounce => {
                debounce_deadline = None;
                if send_sessions_sync(&mut ws_tx, &state).await.is_err() {
                    break;
                }
            }

            event = registry_rx.recv() => {
                match event {
                    Ok(event) => {
                        if send_json(&mut ws_tx, &registry_event_to_message(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            event = agent_rx.recv() => {
                match event {
                    Ok(event) => {
                        if send_json(&mut ws_tx, &agent_event_to_message(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(crate::protocol::AppClientMessage::RequestSync {}) =
                            serde_json::from_str(&text)
                        {
                            if debounce_deadline.is_none() {
                                debounce_deadline =
                                    Some(tokio::time::Instant::now() + state.config.sync_debounce());
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}

async fn send_initial_sync(ws_tx: &mut SplitSink, state: &Arc<AppState>) -> Result<(), ()> {
    send_sessions_sync(ws_tx, state).await?;
    let agents = state.agents.list().await;
    send_json(ws_tx, &AppServerMessage::AgentsSync { agents }).await
}

async fn send_sessions_sync(ws_tx: &mut SplitSink, state: &Arc<AppState>) -> Result<(), ()> {
    let (sessions, activity_states) = state.registry.list_with_activity().await;
    send_json(ws_tx, &AppServerMessage::SessionsSync { sessions, activity_states }).await
}

fn registry_event_to_message(event: RegistryEvent) -> AppServerMessage {
    match event {
        RegistryEvent::SessionCreated { session } => AppServerMessage::SessionCreated { session },
        RegistryEvent::SessionUpdated { session } => AppServerMessage::SessionUpdated { session },
        RegistryEvent::SessionDeleted { session_id } => AppServerMessage::SessionDeleted { session_id },
        RegistryEvent::WorkerActivity { session_id, worker_id, state } => {
            AppServerMessage::WorkerActivity { session_id, worker_id, activity_state: state }
        }
    }
}

fn agent_event_to_message(event: AgentCatalogEvent) -> AppServerMessage {
    match event {
        AgentCatalogEvent::Created { agent } => AppServerMessage::AgentCreated { agent },
        AgentCatalogEvent::Updated { agent } => AppServerMessage::AgentUpdated { agent },
        AgentCatalogEvent::Deleted { agent_id } => AppServerMessage::AgentDeleted { agent_id },
    }
}

type SplitSink = futures_util::stream::SplitSink<WebSocket, Message>;

async fn send_json(ws_tx: &mut SplitSink, msg: &AppServerMessage) -> Result<(), ()> {
    let text = serde_json::to_string(msg).map_err(|_| ())?;
    ws_tx.send(Message::Text(text.into())).await.map_err(|_| ())
}
