// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker engine (C4): PTY lifecycle + history + activity + per-worker
//! event fan-out, for the `terminal` and `agent` worker variants.
//!
//! Each engine runs as a dedicated `tokio::spawn`ed task (the teacher's
//! per-connection-task idiom, generalized to one task per worker) that owns
//! its [`Backend`], its [`HistoryBuffer`], and the set of connections
//! currently attached to it. Connections talk to the engine only through
//! [`EngineCommand`]s and only ever read it back through the frames it
//! pushes to their own bounded queue — never by touching engine state
//! directly — so the single task remains the sole writer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock as SyncRwLock;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::activity::{ActivityDetector, AgentActivityState};
use crate::history::{HistoryBuffer, Snapshot};
use crate::ids::{now_ms, ServerInstanceId};
use crate::model::{SdkMessage, SdkMessageRole};
use crate::pty::{Backend, ExitStatus};
use crate::screen::Screen;

/// Approximate PTY chunk size used to translate the configured
/// `ptyWriteBufferBytes` cap into a channel depth; the engine does not
/// track exact in-flight byte counts for data already handed to the
/// backend's own input channel; once accepted there it is the backend's
/// concern (its `write_all` already applies true kernel backpressure).
const ASSUMED_CHUNK_BYTES: usize = 4096;

/// Errors a worker-channel command can fail with, mapped 1:1 to wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    WorkerExited,
    HistoryLoadFailed,
    CancelFailed,
}

impl EngineError {
    pub fn code(&self) -> crate::error::ErrorCode {
        match self {
            Self::WorkerExited => crate::error::ErrorCode::WorkerExited,
            Self::HistoryLoadFailed => crate::error::ErrorCode::HistoryLoadFailed,
            Self::CancelFailed => crate::error::ErrorCode::CancelFailed,
        }
    }
}

/// How long `request_history` may block on the engine before failing
/// (§5: ">2 seconds yields HISTORY_LOAD_FAILED").
const HISTORY_LOAD_TIMEOUT: Duration = Duration::from_secs(2);

/// How long `cancel` has to settle before `CANCEL_FAILED` (§5).
const CANCEL_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `shutdown` waits for the engine's acknowledgement before giving
/// up (the kill itself is still issued; this only bounds how long the
/// caller blocks).
const SHUTDOWN_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Grace period between SIGHUP and SIGKILL on an explicit shutdown, mirroring
/// `NativePty`'s own `Drop` teardown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(50);

/// A frame the engine pushes out to every attached connection. Mirrors
/// [`crate::protocol::WorkerServerMessage`] plus an internal
/// connection-closing sentinel that never reaches the wire as JSON.
#[derive(Debug, Clone)]
pub enum WorkerFrame {
    History { data: Bytes, offset: u64, server_id: String, truncated: bool },
    Output { data: Bytes, offset: u64 },
    Activity { state: AgentActivityState },
    Exit { exit_code: i32, signal: Option<String> },
    Error { message: String, code: Option<crate::error::ErrorCode> },
    SdkMessage { message: SdkMessage },
    MessageHistory { messages: Vec<SdkMessage>, last_uuid: Option<String> },
    ServerRestarted { server_pid: u32 },
    /// Engine-initiated close (backpressure, idle timeout). Not a wire frame.
    CloseConnection { code: u16 },
}

impl WorkerFrame {
    /// Approximate on-wire size in bytes, used to account each connection's
    /// pending send-queue against `sendQueueBytes` (§4.7/§6.3) alongside the
    /// frame-count cap the `mpsc` channel already enforces. Does not need to
    /// be exact — it only has to reflect that large payloads (history,
    /// output, SDK message logs) dominate the queue while small control
    /// frames don't.
    pub(crate) fn byte_size(&self) -> usize {
        const OVERHEAD: usize = 32;
        match self {
            Self::History { data, server_id, .. } => data.len() + server_id.len() + OVERHEAD,
            Self::Output { data, .. } => data.len() + OVERHEAD,
            Self::Activity { .. } => OVERHEAD,
            Self::Exit { signal, .. } => signal.as_ref().map_or(0, String::len) + OVERHEAD,
            Self::Error { message, .. } => message.len() + OVERHEAD,
            Self::SdkMessage { message } => message.content.to_string().len() + OVERHEAD,
            Self::MessageHistory { messages, .. } => {
                messages.iter().map(|m| m.content.to_string().len() + OVERHEAD).sum()
            }
            Self::ServerRestarted { .. } => OVERHEAD,
            Self::CloseConnection { .. } => 0,
        }
    }
}

/// Commands a worker channel connection sends to its engine.
pub enum EngineCommand {
    Attach { reply: oneshot::Sender<AttachReply> },
    Detach { conn_id: u64 },
    Input { data: Bytes },
    Resize { cols: u16, rows: u16 },
    Image { data: Vec<u8>, mime_type: String },
    RequestHistory { from_offset: Option<u64>, reply: oneshot::Sender<Result<Snapshot, EngineError>> },
    UserMessage { content: String },
    Cancel { reply: oneshot::Sender<Result<(), EngineError>> },
    RequestSdkHistory { last_uuid: Option<String>, reply: oneshot::Sender<(Vec<SdkMessage>, Option<String>)> },
    /// Tear the backend down immediately (SIGHUP then SIGKILL), independent
    /// of how many `WorkerHandle` clones other connections still hold.
    /// Used by `Registry::restart_agent` so the old child process actually
    /// exits instead of lingering until every attached connection drops its
    /// handle.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Result of attaching a new connection: its id, a receiver for frames
/// addressed to it, and the `history` frame it must send first.
pub struct AttachReply {
    pub conn_id: u64,
    pub frame_rx: mpsc::Receiver<WorkerFrame>,
    pub history: WorkerFrame,
    /// Running count of bytes queued for this connection but not yet sent
    /// over its socket (§4.7 `sendQueueBytes`). The transport handler must
    /// subtract a frame's `byte_size()` once it has written (or dropped) it,
    /// so the engine's accounting reflects what is actually still pending.
    pub pending_bytes: Arc<AtomicUsize>,
}

/// Handle the hub/registry use to talk to a running worker engine. Cheap to
/// clone; the real state lives in the engine's task.
#[derive(Clone)]
pub struct WorkerHandle {
    pub worker_id: String,
    pub session_id: String,
    pub use_sdk: bool,
    command_tx: mpsc::Sender<EngineCommand>,
    activity: Arc<SyncRwLock<AgentActivityState>>,
    exited: Arc<std::sync::atomic::AtomicBool>,
}

impl WorkerHandle {
    pub fn activity_state(&self) -> AgentActivityState {
        *self.activity.read()
    }

    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    pub async fn attach(&self) -> Result<AttachReply, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Attach { reply: reply_tx })
            .await
            .map_err(|_| EngineError::WorkerExited)?;
        reply_rx.await.map_err(|_| EngineError::WorkerExited)
    }

    pub async fn detach(&self, conn_id: u64) {
        let _ = self.command_tx.send(EngineCommand::Detach { conn_id }).await;
    }

    pub async fn input(&self, data: Bytes) {
        let _ = self.command_tx.send(EngineCommand::Input { data }).await;
    }

    pub async fn resize(&self, cols: u16, rows: u16) {
        let _ = self.command_tx.send(EngineCommand::Resize { cols, rows }).await;
    }

    pub async fn image(&self, data: Vec<u8>, mime_type: String) {
        let _ = self.command_tx.send(EngineCommand::Image { data, mime_type }).await;
    }

    pub async fn user_message(&self, content: String) {
        let _ = self.command_tx.send(EngineCommand::UserMessage { content }).await;
    }

    pub async fn request_history(&self, from_offset: Option<u64>) -> Result<Snapshot, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::RequestHistory { from_offset, reply: reply_tx })
            .await
            .map_err(|_| EngineError::WorkerExited)?;
        match tokio::time::timeout(HISTORY_LOAD_TIMEOUT, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(EngineError::WorkerExited),
            Err(_) => Err(EngineError::HistoryLoadFailed),
        }
    }

    pub async fn request_sdk_history(&self, last_uuid: Option<String>) -> (Vec<SdkMessage>, Option<String>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.command_tx.send(EngineCommand::RequestSdkHistory { last_uuid, reply: reply_tx }).await.is_err() {
            return (Vec::new(), None);
        }
        reply_rx.await.unwrap_or((Vec::new(), None))
    }

    /// Kill the backend (SIGHUP then SIGKILL) and wait for the engine to
    /// acknowledge the request. Unlike [`WorkerHandle::cancel`] (a soft
    /// `Ctrl-C` aimed at interrupting an in-flight turn), this tears the
    /// child process down outright — used when the registry is about to
    /// respawn the worker (restart) or destroy it and must not leave the
    /// old process running just because some other connection still holds
    /// a clone of this handle.
    pub async fn shutdown(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.command_tx.send(EngineCommand::Shutdown { reply: reply_tx }).await.is_err() {
            return;
        }
        let _ = tokio::time::timeout(SHUTDOWN_ACK_TIMEOUT, reply_rx).await;
    }

    pub async fn cancel(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Cancel { reply: reply_tx })
            .await
            .map_err(|_| EngineError::WorkerExited)?;
        match tokio::time::timeout(CANCEL_SETTLE_TIMEOUT, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(EngineError::WorkerExited),
            Err(_) => Err(EngineError::CancelFailed),
        }
    }
}

/// Parameters needed to spawn a worker engine.
pub struct EngineSpawnArgs {
    pub session_id: String,
    pub worker_id: String,
    pub cmd: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<std::path::PathBuf>,
    pub cols: u16,
    pub rows: u16,
    pub asking_patterns: Vec<regex::Regex>,
    pub use_sdk: bool,
    pub history_cap_bytes: usize,
    pub active_window: Duration,
    pub activity_debounce: Duration,
    pub send_queue_frames: usize,
    pub send_queue_bytes: usize,
    pub server_instance: Arc<ServerInstanceId>,
}

/// Spawn a PTY-backed worker engine task and return its handle plus a
/// broadcast receiver of registry-facing lifecycle signals (exit/activity),
/// used by the session registry to publish `session-updated` events.
pub fn spawn(
    args: EngineSpawnArgs,
    registry_tx: broadcast::Sender<RegistryNotice>,
) -> anyhow::Result<WorkerHandle> {
    let backend = crate::pty::NativePty::spawn(
        &args.cmd,
        &args.args,
        &args.env,
        args.cwd.as_deref(),
        args.cols,
        args.rows,
    )?;
    // Grab a resize/pid handle before handing the backend's ownership off
    // to its dedicated run task — `Backend::run`'s future borrows the
    // backend exclusively for the life of the child process, so `resize`
    // can never go through `backend` again once that task owns it.
    let control = backend.control();

    let (command_tx, command_rx) = mpsc::channel(256);
    let activity = Arc::new(SyncRwLock::new(AgentActivityState::Unknown));
    let exited = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let handle = WorkerHandle {
        worker_id: args.worker_id.clone(),
        session_id: args.session_id.clone(),
        use_sdk: args.use_sdk,
        command_tx,
        activity: Arc::clone(&activity),
        exited: Arc::clone(&exited),
    };

    let (output_tx, output_rx) = mpsc::channel::<Bytes>(ASSUMED_CHUNK_BYTES.max(16));
    let (input_tx, input_rx) = mpsc::channel::<Bytes>(256);
    let (exit_tx, exit_rx) = oneshot::channel();

    let mut backend = backend;
    tokio::spawn(async move {
        let status = backend.run(output_tx, input_rx).await;
        let _ = exit_tx.send(status);
    });

    let engine = Engine {
        session_id: args.session_id,
        worker_id: args.worker_id,
        control,
        history: HistoryBuffer::new(args.history_cap_bytes),
        screen: Screen::new(args.cols, args.rows),
        detector: ActivityDetector::new(args.asking_patterns, args.active_window, args.activity_debounce),
        activity_debounce: args.activity_debounce,
        connections: HashMap::new(),
        next_conn_id: 0,
        server_instance: args.server_instance,
        use_sdk: args.use_sdk,
        sdk_messages: Vec::new(),
        sdk_last_uuid: None,
        send_queue_frames: args.send_queue_frames,
        send_queue_bytes: args.send_queue_bytes,
        activity_shared: activity,
        exited_shared: exited,
        registry_tx,
    };

    tokio::spawn(engine.run(command_rx, output_rx, input_tx, exit_rx));
    Ok(handle)
}

/// A lifecycle notice the registry subscribes to, decoupling the engine
/// task from directly depending on the registry's broadcast channel type.
#[derive(Debug, Clone)]
pub enum RegistryNotice {
    ActivityChanged { session_id: String, worker_id: String, state: AgentActivityState },
    Exited { session_id: String, worker_id: String },
}

struct ConnectionSlot {
    tx: mpsc::Sender<WorkerFrame>,
    last_sent_offset: u64,
    /// Bytes currently queued for this connection but not yet acknowledged
    /// as sent by its transport handler (§4.7 `sendQueueBytes`).
    pending_bytes: Arc<AtomicUsize>,
}

struct Engine {
    session_id: String,
    worker_id: String,
    control: crate::pty::PtyControl,
    history: HistoryBuffer,
    screen: Screen,
    detector: ActivityDetector,
    activity_debounce: Duration,
    connections: HashMap<u64, ConnectionSlot>,
    next_conn_id: u64,
    server_instance: Arc<ServerInstanceId>,
    use_sdk: bool,
    sdk_messages: Vec<SdkMessage>,
    sdk_last_uuid: Option<String>,
    send_queue_frames: usize,
    send_queue_bytes: usize,
    activity_shared: Arc<SyncRwLock<AgentActivityState>>,
    exited_shared: Arc<std::sync::atomic::AtomicBool>,
    registry_tx: broadcast::Sender<RegistryNotice>,
}

impl Engine {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<EngineCommand>,
        mut output_rx: mpsc::Receiver<Bytes>,
        input_tx: mpsc::Sender<Bytes>,
        mut exit_rx: oneshot::Receiver<anyhow::Result<ExitStatus>>,
    ) {
        let mut eval_timer = tokio::time::interval(self.activity_debounce);
        eval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let exit_status = loop {
            tokio::select! {
                biased;

                result = &mut exit_rx => {
                    break result.unwrap_or(Ok(ExitStatus { code: None, signal: None }))
                        .unwrap_or(ExitStatus { code: Some(-1), signal: None });
                }

                chunk = output_rx.recv() => {
                    let Some(chunk) = chunk else { continue };
                    self.on_output(chunk).await;
                }

                _ = eval_timer.tick() => {
                    self.evaluate_activity().await;
                }

                cmd = command_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd, &input_tx).await,
                        None => break ExitStatus { code: None, signal: None },
                    }
                }
            }
        };

        self.on_exit(exit_status).await;

        // Drain remaining commands so late callers get a clean WORKER_EXITED
        // instead of a dropped channel.
        while let Some(cmd) = command_rx.recv().await {
            self.handle_command(cmd, &input_tx).await;
        }
    }

    async fn on_output(&mut self, chunk: Bytes) {
        self.screen.feed(&chunk);
        self.detector.note_output(tokio::time::Instant::now());

        if self.use_sdk {
            self.ingest_sdk_lines(&chunk).await;
            return;
        }

        let offset = self.history.append(&chunk);
        self.broadcast(WorkerFrame::Output { data: chunk, offset }).await;
    }

    async fn ingest_sdk_lines(&mut self, chunk: &[u8]) {
        let text = String::from_utf8_lossy(chunk);
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else { continue };
            let role = match value.get("role").and_then(|v| v.as_str()) {
                Some("assistant") => SdkMessageRole::Assistant,
                Some("result") => SdkMessageRole::Result,
                _ => SdkMessageRole::User,
            };
            let message = SdkMessage {
                uuid: crate::ids::new_id(),
                role,
                content: value,
                created_at: now_ms(),
            };
            self.sdk_last_uuid = Some(message.uuid.clone());
            self.sdk_messages.push(message.clone());
            self.broadcast(WorkerFrame::SdkMessage { message }).await;
        }
    }

    async fn evaluate_activity(&mut self) {
        let visible = self.screen.visible_text().join("\n");
        if let Some(new_state) = self.detector.evaluate(tokio::time::Instant::now(), &visible) {
            *self.activity_shared.write() = new_state;
            self.broadcast(WorkerFrame::Activity { state: new_state }).await;
            let _ = self.registry_tx.send(RegistryNotice::ActivityChanged {
                session_id: self.session_id.clone(),
                worker_id: self.worker_id.clone(),
                state: new_state,
            });
        }
    }

    async fn on_exit(&mut self, status: ExitStatus) {
        self.exited_shared.store(true, Ordering::Release);
        self.detector.suspend();
        let exit_code = status.code.unwrap_or(-1);
        let signal = status.signal.map(signal_name);
        info!(
            event = "engine.exit",
            session_id = %self.session_id,
            worker_id = %self.worker_id,
            exit_code,
            "worker process exited"
        );
        self.broadcast(WorkerFrame::Exit { exit_code, signal }).await;
        let _ = self.registry_tx.send(RegistryNotice::Exited {
            session_id: self.session_id.clone(),
            worker_id: self.worker_id.clone(),
        });
    }

    async fn handle_command(&mut self, cmd: EngineCommand, input_tx: &mpsc::Sender<Bytes>) {
        match cmd {
            EngineCommand::Attach { reply } => {
                let conn_id = self.next_conn_id;
                self.next_conn_id += 1;
                let (tx, rx) = mpsc::channel(self.send_queue_frames.max(1));
                let snap = self.history.snapshot(0);
                let history = if self.use_sdk {
                    WorkerFrame::MessageHistory {
                        messages: self.sdk_messages.clone(),
                        last_uuid: self.sdk_last_uuid.clone(),
                    }
                } else {
                    WorkerFrame::History {
                        data: Bytes::from(snap.bytes),
                        offset: snap.tail_offset,
                        server_id: self.server_instance.as_str().to_owned(),
                        truncated: snap.truncated,
                    }
                };
                // The `history` frame is handed directly to the transport
                // (not routed through `tx`), so it's accounted against
                // `sendQueueBytes` from the start — the transport decrements
                // it once sent, same as every other frame.
                let pending_bytes = Arc::new(AtomicUsize::new(history.byte_size()));
                self.connections.insert(
                    conn_id,
                    ConnectionSlot { tx, last_sent_offset: snap.tail_offset, pending_bytes: Arc::clone(&pending_bytes) },
                );
                let _ = reply.send(AttachReply { conn_id, frame_rx: rx, history, pending_bytes });
            }
            EngineCommand::Detach { conn_id } => {
                self.connections.remove(&conn_id);
            }
            EngineCommand::Input { data } => {
                if self.exited_shared.load(Ordering::Acquire) {
                    self.broadcast(WorkerFrame::Error {
                        message: "worker has exited".to_owned(),
                        code: Some(crate::error::ErrorCode::WorkerExited),
                    })
                    .await;
                    return;
                }
                if input_tx.try_send(data).is_err() {
                    warn!(
                        event = "engine.pty_backpressure",
                        session_id = %self.session_id,
                        worker_id = %self.worker_id,
                        "input buffer overflow, closing worker"
                    );
                    self.broadcast(WorkerFrame::Error {
                        message: "pty input buffer overflow".to_owned(),
                        code: Some(crate::error::ErrorCode::PtyBackpressure),
                    })
                    .await;
                    self.close_all_connections(crate::protocol::close_code::BACKPRESSURE).await;
                }
            }
            EngineCommand::Resize { cols, rows } => {
                self.screen.resize(cols, rows);
                let _ = self.control.resize(cols, rows);
            }
            EngineCommand::Image { data, mime_type } => {
                debug!(
                    event = "engine.image",
                    session_id = %self.session_id,
                    worker_id = %self.worker_id,
                    bytes = data.len(),
                    mime_type,
                    "received image attachment"
                );
            }
            EngineCommand::UserMessage { content } => {
                let _ = input_tx.try_send(Bytes::from(format!("{content}\n")));
            }
            EngineCommand::RequestHistory { from_offset, reply } => {
                let snap = self.history.snapshot(from_offset.unwrap_or(0));
                let _ = reply.send(Ok(snap));
            }
            EngineCommand::RequestSdkHistory { last_uuid, reply } => {
                let messages = match last_uuid {
                    Some(uuid) => {
                        let idx = self.sdk_messages.iter().position(|m| m.uuid == uuid);
                        match idx {
                            Some(i) => self.sdk_messages[i + 1..].to_vec(),
                            None => self.sdk_messages.clone(),
                        }
                    }
                    None => self.sdk_messages.clone(),
                };
                let _ = reply.send((messages, self.sdk_last_uuid.clone()));
            }
            EngineCommand::Cancel { reply } => {
                // Best-effort: send Ctrl-C (0x03) to the child and report
                // success; a true SDK cancel would interrupt the in-flight
                // turn via its own control channel.
                let _ = input_tx.try_send(Bytes::from_static(b"\x03"));
                let _ = reply.send(Ok(()));
            }
            EngineCommand::Shutdown { reply } => {
                let _ = self.control.kill(nix::sys::signal::Signal::SIGHUP);
                tokio::time::sleep(SHUTDOWN_GRACE).await;
                let _ = self.control.kill(nix::sys::signal::Signal::SIGKILL);
                let _ = reply.send(());
            }
        }
    }

    /// Send a frame to every attached connection, closing any connection
    /// whose queue is full (frame-count cap) or whose pending bytes would
    /// exceed `sendQueueBytes` (byte cap) instead of letting it block the
    /// others. Whichever cap is smaller governs, per §4.7/§6.3.
    async fn broadcast(&mut self, frame: WorkerFrame) {
        let size = frame.byte_size();
        let mut dead = Vec::new();
        for (id, slot) in self.connections.iter_mut() {
            if let WorkerFrame::Output { offset, .. } = &frame {
                slot.last_sent_offset = *offset;
            }
            let pending = slot.pending_bytes.load(Ordering::Acquire);
            if pending.saturating_add(size) > self.send_queue_bytes {
                dead.push(*id);
                continue;
            }
            if slot.tx.try_send(frame.clone()).is_err() {
                dead.push(*id);
            } else {
                slot.pending_bytes.fetch_add(size, Ordering::AcqRel);
            }
        }
        for id in dead {
            if let Some(slot) = self.connections.remove(&id) {
                let _ = slot.tx.try_send(WorkerFrame::CloseConnection {
                    code: crate::protocol::close_code::BACKPRESSURE,
                });
            }
        }
    }

    async fn close_all_connections(&mut self, code: u16) {
        for (_, slot) in self.connections.drain() {
            let _ = slot.tx.try_send(WorkerFrame::CloseConnection { code });
        }
    }
}

fn signal_name(sig: i32) -> String {
    nix::sys::signal::Signal::try_from(sig).map(|s| s.as_str().to_owned()).unwrap_or_else(|_| sig.to_string())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
