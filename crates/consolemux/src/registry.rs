// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry (C5): the single writer for session/worker structure.
//! Owns every Worker engine and git-diff worker, constructs them lazily (or
//! eagerly for `git-diff`) on first attach, and publishes registry events to
//! every subscribed app channel via a `broadcast` hub (the teacher's
//! `Aggregator` pattern, generalized from session-scoped mux events to
//! session/worker lifecycle events).

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::activity::AgentActivityState;
use crate::config::Config;
use crate::engine::{self, EngineSpawnArgs, RegistryNotice, WorkerHandle};
use crate::gitdiff::{self, GitDiffHandle};
use crate::ids::{new_id, now_ms, ServerInstanceId};
use crate::model::{
    AgentDefinition, Session, SessionStatus, SessionType, Worker, WorkerActivitySnapshot, WorkerKindData, WorkerType,
};

/// Fan-out event published to every app channel, mirroring
/// [`crate::protocol::AppServerMessage`] minus the `agents-*` variants,
/// which the registry does not originate (agent definitions are externally
/// supplied, see [`crate::model::AgentDefinition`]).
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    SessionCreated { session: Session },
    SessionUpdated { session: Session },
    SessionDeleted { session_id: String },
    WorkerActivity { session_id: String, worker_id: String, state: AgentActivityState },
}

/// Caller-supplied parameters for creating a new session. `agent` mirrors
/// the externally-supplied [`AgentDefinition`] used to construct an agent
/// worker's command line (§6.2); omit it for a plain `terminal`-only
/// session.
pub struct CreateSessionSpec {
    pub kind: SessionType,
    pub location_path: String,
    pub repository_id: Option<String>,
    pub worktree_id: Option<String>,
    pub title: Option<String>,
    pub initial_prompt: Option<String>,
    pub agent: Option<AgentWorkerSpec>,
    pub include_terminal: bool,
    pub include_git_diff: bool,
}

pub struct AgentWorkerSpec {
    pub definition: AgentDefinition,
    pub use_sdk: bool,
}

/// What to change about an existing session; `None` fields are left as-is.
#[derive(Default)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub initial_prompt: Option<String>,
}

pub struct RestartAgentSpec {
    pub agent_id: Option<String>,
    pub branch: Option<String>,
    pub continue_conversation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    SessionNotFound,
    WorkerNotFound,
    NotAnAgentWorker,
}

/// A slot for one worker's metadata plus its runtime handle, if spawned.
struct WorkerSlot {
    worker: Worker,
    runtime: Option<WorkerRuntime>,
    agent_definition: Option<AgentDefinition>,
}

enum WorkerRuntime {
    Pty(WorkerHandle),
    GitDiff(GitDiffHandle),
}

struct SessionEntry {
    session: Session,
    workers: IndexMap<String, WorkerSlot>,
}

/// In-memory session/worker store and event hub (C5).
pub struct Registry {
    sessions: RwLock<IndexMap<String, SessionEntry>>,
    event_tx: broadcast::Sender<RegistryEvent>,
    config: Arc<Config>,
    server_instance: Arc<ServerInstanceId>,
    shutdown: CancellationToken,
    notice_tx: broadcast::Sender<RegistryNotice>,
}

impl Registry {
    pub fn new(config: Arc<Config>, server_instance: Arc<ServerInstanceId>, shutdown: CancellationToken) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(256);
        let (notice_tx, notice_rx) = broadcast::channel(256);
        let registry = Arc::new(Self {
            sessions: RwLock::new(IndexMap::new()),
            event_tx,
            config,
            server_instance,
            shutdown,
            notice_tx,
        });
        spawn_notice_pump(Arc::clone(&registry), notice_rx);
        registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }

    pub async fn create(&self, spec: CreateSessionSpec) -> Session {
        let session_id = new_id();
        let mut workers = IndexMap::new();

        if let Some(agent) = spec.agent {
            let worker_id = new_id();
            workers.insert(
                worker_id.clone(),
                WorkerSlot {
                    worker: Worker {
                        id: worker_id,
                        kind: WorkerType::Agent,
                        name: agent.definition.name.clone(),
                        created_at: now_ms(),
                        activated: false,
                        data: WorkerKindData::Agent { agent_id: agent.definition.id.clone(), use_sdk: agent.use_sdk },
                    },
                    runtime: None,
                    agent_definition: Some(agent.definition),
                },
            );
        }

        if spec.include_terminal {
            let worker_id = new_id();
            workers.insert(
                worker_id.clone(),
                WorkerSlot {
                    worker: Worker {
                        id: worker_id,
                        kind: WorkerType::Terminal,
                        name: "terminal".to_owned(),
                        created_at: now_ms(),
                        activated: false,
                        data: WorkerKindData::Terminal,
                    },
                    runtime: None,
                    agent_definition: None,
                },
            );
        }

        if spec.include_git_diff {
            let worker_id = new_id();
            let handle = gitdiff::worker::spawn(
                std::path::PathBuf::from(&spec.location_path),
                self.config.gitdiff_poll_interval(),
                self.shutdown.clone(),
            );
            workers.insert(
                worker_id.clone(),
                WorkerSlot {
                    worker: Worker {
                        id: worker_id,
                        kind: WorkerType::GitDiff,
                        name: "git-diff".to_owned(),
                        created_at: now_ms(),
                        activated: true,
                        data: WorkerKindData::GitDiff {
                            base_commit: "HEAD".to_owned(),
                            target_ref: "working-dir".to_owned(),
                        },
                    },
                    runtime: Some(WorkerRuntime::GitDiff(handle)),
                    agent_definition: None,
                },
            );
        }

        let session = Session {
            id: session_id.clone(),
            kind: spec.kind,
            location_path: spec.location_path,
            repository_id: spec.repository_id,
            worktree_id: spec.worktree_id,
            status: SessionStatus::Active,
            created_at: now_ms(),
            title: spec.title,
            initial_prompt: spec.initial_prompt,
            workers: workers.keys().cloned().collect(),
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id, SessionEntry { session: session.clone(), workers });
        drop(sessions);

        info!(event = "registry.session_created", session_id = %session.id, "session created");
        let _ = self.event_tx.send(RegistryEvent::SessionCreated { session: session.clone() });
        session
    }

    pub async fn update(&self, session_id: &str, patch: SessionPatch) -> Result<Session, RegistryError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(session_id).ok_or(RegistryError::SessionNotFound)?;
        if let Some(title) = patch.title {
            entry.session.title = Some(title);
        }
        if let Some(prompt) = patch.initial_prompt {
            entry.session.initial_prompt = Some(prompt);
        }
        let session = entry.session.clone();
        drop(sessions);

        let _ = self.event_tx.send(RegistryEvent::SessionUpdated { session: session.clone() });
        Ok(session)
    }

    /// Attach to `(session_id, worker_id)`, spawning its engine on first
    /// attach if it is a terminal/agent worker that hasn't started yet.
    pub async fn attach_worker(&self, session_id: &str, worker_id: &str) -> Result<WorkerHandle, RegistryError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(session_id).ok_or(RegistryError::SessionNotFound)?;
        let slot = entry.workers.get_mut(worker_id).ok_or(RegistryError::WorkerNotFound)?;

        if let Some(WorkerRuntime::Pty(handle)) = &slot.runtime {
            return Ok(handle.clone());
        }

        let (cmd, args, use_sdk) = command_for(&slot.worker, slot.agent_definition.as_ref());
        let asking_patterns = slot
            .agent_definition
            .as_ref()
            .map(|def| compile_asking_patterns(&def.activity_patterns.asking_patterns))
            .unwrap_or_default();

        let handle = engine::spawn(
            EngineSpawnArgs {
                session_id: session_id.to_owned(),
                worker_id: worker_id.to_owned(),
                cmd,
                args,
                env: Vec::new(),
                cwd: Some(std::path::PathBuf::from(&entry.session.location_path)),
                cols: 80,
                rows: 24,
                asking_patterns,
                use_sdk,
                history_cap_bytes: self.config.history_cap_bytes(),
                active_window: self.config.active_window(),
                activity_debounce: self.config.activity_debounce(),
                send_queue_frames: self.config.send_queue_frames,
                send_queue_bytes: self.config.send_queue_bytes,
                server_instance: Arc::clone(&self.server_instance),
            },
            self.notice_tx.clone(),
        )
        .map_err(|_| RegistryError::WorkerNotFound)?;

        slot.worker.activated = true;
        slot.runtime = Some(WorkerRuntime::Pty(handle.clone()));
        let session = entry.session.clone();
        drop(sessions);

        let _ = self.event_tx.send(RegistryEvent::SessionUpdated { session });
        Ok(handle)
    }

    /// Look up a worker's kind without attaching, so the hub can route an
    /// incoming worker-channel connection to the right protocol.
    pub async fn worker_kind(&self, session_id: &str, worker_id: &str) -> Option<WorkerType> {
        let sessions = self.sessions.read().await;
        let slot = sessions.get(session_id)?.workers.get(worker_id)?;
        Some(slot.worker.kind.clone())
    }

    pub async fn attach_gitdiff_worker(
        &self,
        session_id: &str,
        worker_id: &str,
    ) -> Result<GitDiffHandle, RegistryError> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(session_id).ok_or(RegistryError::SessionNotFound)?;
        let slot = entry.workers.get(worker_id).ok_or(RegistryError::WorkerNotFound)?;
        match &slot.runtime {
            Some(WorkerRuntime::GitDiff(handle)) => Ok(handle.clone()),
            _ => Err(RegistryError::WorkerNotFound),
        }
    }

    /// Restart an agent worker in place: kill its PTY, optionally swap
    /// `agentId`, respawn with the same worker id, and reset its history
    /// (new logical stream starting at offset 0 for that worker).
    pub async fn restart_agent(
        &self,
        session_id: &str,
        worker_id: &str,
        spec: RestartAgentSpec,
    ) -> Result<Session, RegistryError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(session_id).ok_or(RegistryError::SessionNotFound)?;
        let slot = entry.workers.get_mut(worker_id).ok_or(RegistryError::WorkerNotFound)?;

        let (agent_id, use_sdk) = match &slot.worker.data {
            WorkerKindData::Agent { agent_id, use_sdk } => (agent_id.clone(), *use_sdk),
            _ => return Err(RegistryError::NotAnAgentWorker),
        };

        if let Some(WorkerRuntime::Pty(handle)) = slot.runtime.take() {
            handle.shutdown().await;
        }

        let new_agent_id = spec.agent_id.unwrap_or(agent_id);
        slot.worker.data = WorkerKindData::Agent { agent_id: new_agent_id, use_sdk };
        slot.worker.activated = false;
        if let Some(branch) = spec.branch {
            entry.session.worktree_id = Some(branch);
        }

        let session = entry.session.clone();
        drop(sessions);

        let _ = self.event_tx.send(RegistryEvent::SessionUpdated { session: session.clone() });
        Ok(session)
    }

    pub async fn delete(&self, session_id: &str) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.shift_remove(session_id).ok_or(RegistryError::SessionNotFound)?;
        drop(sessions);

        for (_, slot) in entry.workers {
            if let Some(WorkerRuntime::Pty(handle)) = slot.runtime {
                drop(handle);
            }
        }

        info!(event = "registry.session_deleted", session_id, "session deleted");
        let _ = self.event_tx.send(RegistryEvent::SessionDeleted { session_id: session_id.to_owned() });
        Ok(())
    }

    /// Snapshot for the `sessions-sync` frame: every session plus the
    /// current activity state of every worker that has been spawned.
    pub async fn list_with_activity(&self) -> (Vec<Session>, Vec<WorkerActivitySnapshot>) {
        let sessions = self.sessions.read().await;
        let mut session_list = Vec::with_capacity(sessions.len());
        let mut activity = Vec::new();

        for entry in sessions.values() {
            session_list.push(entry.session.clone());
            for slot in entry.workers.values() {
                if let Some(WorkerRuntime::Pty(handle)) = &slot.runtime {
                    activity.push(WorkerActivitySnapshot {
                        session_id: entry.session.id.clone(),
                        worker_id: slot.worker.id.clone(),
                        activity_state: handle.activity_state(),
                    });
                }
            }
        }
        (session_list, activity)
    }
}

/// Aggregate a session's worker activity states per §3: `asking` beats
/// `idle` beats `active` beats `unknown`.
pub fn aggregate_activity(states: &[AgentActivityState]) -> AgentActivityState {
    states
        .iter()
        .copied()
        .max_by_key(|s| match s {
            AgentActivityState::Unknown => 0,
            AgentActivityState::Active => 1,
            AgentActivityState::Idle => 2,
            AgentActivityState::Asking => 3,
        })
        .unwrap_or(AgentActivityState::Unknown)
}

fn compile_asking_patterns(raw: &[String]) -> Vec<regex::Regex> {
    raw.iter().filter_map(|p| regex::Regex::new(p).ok()).collect()
}

/// Build the command line for a worker from its kind and, for agent
/// workers, its externally-supplied definition.
fn command_for(worker: &Worker, definition: Option<&AgentDefinition>) -> (String, Vec<String>, bool) {
    match &worker.data {
        WorkerKindData::Terminal => {
            let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_owned());
            (shell, Vec::new(), false)
        }
        WorkerKindData::Agent { use_sdk, .. } => {
            let template = definition.map(|d| d.command_template.as_str()).unwrap_or("/bin/sh");
            let mut parts = template.split_whitespace();
            let cmd = parts.next().unwrap_or("/bin/sh").to_owned();
            (cmd, parts.map(str::to_owned).collect(), *use_sdk)
        }
        WorkerKindData::GitDiff { .. } => {
            let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_owned());
            (shell, Vec::new(), false)
        }
    }
}

/// Forward engine lifecycle notices into registry-facing events: an
/// activity change republishes `worker-activity`; an exit republishes
/// `session-updated` so app channels see the worker's terminal state.
fn spawn_notice_pump(registry: Arc<Registry>, mut notice_rx: broadcast::Receiver<RegistryNotice>) {
    tokio::spawn(async move {
        loop {
            match notice_rx.recv().await {
                Ok(RegistryNotice::ActivityChanged { session_id, worker_id, state }) => {
                    let _ = registry.event_tx.send(RegistryEvent::WorkerActivity {
                        session_id,
                        worker_id,
                        state,
                    });
                }
                Ok(RegistryNotice::Exited { session_id, .. }) => {
                    let sessions = registry.sessions.read().await;
                    if let Some(entry) = sessions.get(&session_id) {
                        let session = entry.session.clone();
                        drop(sessions);
                        let _ = registry.event_tx.send(RegistryEvent::SessionUpdated { session });
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
