// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git-diff worker task: owns a [`GitDiffEngine`] and, when the target is
//! `working-dir`, a [`WorktreeWatcher`] that wakes it to recompute. Runs as
//! its own `tokio::spawn`ed task per the same per-worker-task idiom the
//! terminal/agent engine uses, so a slow or misbehaving diff computation
//! never blocks any other worker.

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{DiffResult, DiffSummary, GitDiffEngine, TargetRef};

/// A frame the git-diff worker pushes out to every attached connection.
#[derive(Debug, Clone)]
pub enum GitDiffFrame {
    Data { summary: DiffSummary, raw_diff: String },
    Error { message: String },
}

/// Answer to a `request-expand`: unchanged context lines around a hunk.
#[derive(Debug, Clone)]
pub struct ExpandedLines {
    pub path: String,
    pub start_line: u32,
    pub lines: Vec<String>,
}

pub enum GitDiffCommand {
    Attach { reply: oneshot::Sender<(u64, mpsc::Receiver<GitDiffFrame>, Option<DiffResult>)> },
    Detach { conn_id: u64 },
    Refresh,
    SetBaseCommit { git_ref: String, reply: oneshot::Sender<Result<(), String>> },
    SetTargetCommit { target: String },
    RequestExpand { path: String, start_line: u32, end_line: u32, reply: oneshot::Sender<Option<ExpandedLines>> },
}

#[derive(Clone)]
pub struct GitDiffHandle {
    command_tx: mpsc::Sender<GitDiffCommand>,
}

impl GitDiffHandle {
    pub async fn attach(&self) -> Option<(u64, mpsc::Receiver<GitDiffFrame>, Option<DiffResult>)> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx.send(GitDiffCommand::Attach { reply: reply_tx }).await.ok()?;
        reply_rx.await.ok()
    }

    pub async fn detach(&self, conn_id: u64) {
        let _ = self.command_tx.send(GitDiffCommand::Detach { conn_id }).await;
    }

    pub async fn refresh(&self) {
        let _ = self.command_tx.send(GitDiffCommand::Refresh).await;
    }

    pub async fn set_base_commit(&self, git_ref: String) -> Result<(), String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.command_tx.send(GitDiffCommand::SetBaseCommit { git_ref, reply: reply_tx }).await.is_err() {
            return Err("git-diff worker exited".to_owned());
        }
        reply_rx.await.unwrap_or_else(|_| Err("git-diff worker exited".to_owned()))
    }

    pub async fn set_target_commit(&self, target: String) {
        let _ = self.command_tx.send(GitDiffCommand::SetTargetCommit { target }).await;
    }

    pub async fn request_expand(&self, path: String, start_line: u32, end_line: u32) -> Option<ExpandedLines> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(GitDiffCommand::RequestExpand { path, start_line, end_line, reply: reply_tx })
            .await
            .ok()?;
        reply_rx.await.ok().flatten()
    }
}

/// Spawn a git-diff worker task for `worktree_path`, watching for changes
/// whenever its target ref is `working-dir`. `poll_interval` bounds the
/// watcher's polling fallback cadence.
pub fn spawn(
    worktree_path: PathBuf,
    poll_interval: std::time::Duration,
    shutdown: CancellationToken,
) -> GitDiffHandle {
    let (command_tx, command_rx) = mpsc::channel(64);
    let (wake_tx, wake_rx) = mpsc::channel(1);

    let watcher_path = worktree_path.clone();
    let watcher_shutdown = shutdown.clone();
    tokio::spawn(async move {
        super::WorktreeWatcher::new(watcher_path).with_poll_interval(poll_interval).run(wake_tx, watcher_shutdown).await;
    });

    let task = GitDiffWorker {
        engine: GitDiffEngine::new(worktree_path.clone()),
        worktree_path,
        connections: std::collections::HashMap::new(),
        next_conn_id: 0,
    };
    tokio::spawn(task.run(command_rx, wake_rx, shutdown));

    GitDiffHandle { command_tx }
}

struct GitDiffWorker {
    engine: GitDiffEngine,
    worktree_path: PathBuf,
    connections: std::collections::HashMap<u64, mpsc::Sender<GitDiffFrame>>,
    next_conn_id: u64,
}

impl GitDiffWorker {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<GitDiffCommand>,
        mut wake_rx: mpsc::Receiver<()>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => break,
                    }
                }
                wake = wake_rx.recv() => {
                    if wake.is_none() {
                        continue;
                    }
                    if self.engine.target_ref().is_working_dir() {
                        self.refresh_and_broadcast().await;
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: GitDiffCommand) {
        match cmd {
            GitDiffCommand::Attach { reply } => {
                let conn_id = self.next_conn_id;
                self.next_conn_id += 1;
                let (tx, rx) = mpsc::channel(32);
                self.connections.insert(conn_id, tx);
                let _ = reply.send((conn_id, rx, self.engine.cached().cloned()));
            }
            GitDiffCommand::Detach { conn_id } => {
                self.connections.remove(&conn_id);
            }
            GitDiffCommand::Refresh => {
                self.refresh_and_broadcast().await;
            }
            GitDiffCommand::SetBaseCommit { git_ref, reply } => {
                let result = self.engine.set_base_commit(&git_ref).map_err(|e| e.to_string());
                let _ = reply.send(result);
                self.refresh_and_broadcast().await;
            }
            GitDiffCommand::SetTargetCommit { target } => {
                self.engine.set_target_ref(TargetRef::parse(&target));
                self.refresh_and_broadcast().await;
            }
            GitDiffCommand::RequestExpand { path, start_line, end_line, reply } => {
                let _ = reply.send(expand_lines(&self.worktree_path, &path, start_line, end_line));
            }
        }
    }

    async fn refresh_and_broadcast(&mut self) {
        let frame = match self.engine.refresh() {
            Ok(DiffResult { summary, raw_diff }) => GitDiffFrame::Data { summary, raw_diff },
            Err(e) => {
                warn!(event = "gitdiff_worker.refresh_failed", error = %e, "diff refresh failed");
                GitDiffFrame::Error { message: e.to_string() }
            }
        };
        let mut dead = Vec::new();
        for (id, tx) in self.connections.iter() {
            if tx.try_send(frame.clone()).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            self.connections.remove(&id);
        }
    }
}

/// Read `[start_line, end_line]` (1-indexed, inclusive) of `path` relative
/// to the worktree root. Returns `None` if the file can't be read or the
/// range is empty; used to answer `request-expand` for unchanged context
/// around a hunk.
fn expand_lines(worktree_path: &std::path::Path, path: &str, start_line: u32, end_line: u32) -> Option<ExpandedLines> {
    if end_line < start_line {
        return None;
    }
    let contents = std::fs::read_to_string(worktree_path.join(path)).ok()?;
    let start = start_line.saturating_sub(1) as usize;
    let end = end_line as usize;
    let lines: Vec<String> = contents.lines().skip(start).take(end.saturating_sub(start)).map(str::to_owned).collect();
    if lines.is_empty() {
        return None;
    }
    Some(ExpandedLines { path: path.to_owned(), start_line, lines })
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
