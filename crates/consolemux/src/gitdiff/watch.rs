// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default polling fallback cadence: 2 Hz, the spec's cap.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Watches a session's worktree for changes, waking the git-diff worker to
/// recompute its summary. Uses `notify` for filesystem events with a
/// polling fallback for filesystems where the native watcher can't attach.
pub struct WorktreeWatcher {
    worktree_path: PathBuf,
    poll_interval: Duration,
}

impl WorktreeWatcher {
    pub fn new(worktree_path: PathBuf) -> Self {
        Self { worktree_path, poll_interval: DEFAULT_POLL_INTERVAL }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run until `shutdown` is cancelled, sending a wake on every detected
    /// change (or on every poll tick if no native watcher could attach).
    pub async fn run(self, wake_tx: mpsc::Sender<()>, shutdown: CancellationToken) {
        let (notify_tx, mut notify_rx) = mpsc::channel::<()>(1);
        let watcher = self.setup_notify_watcher(notify_tx);
        let native_watch_active = watcher.is_some();

        let mut poll_interval = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = notify_rx.recv() => {
                    if wake_tx.send(()).await.is_err() {
                        break;
                    }
                }
                _ = poll_interval.tick(), if !native_watch_active => {
                    if wake_tx.send(()).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    fn setup_notify_watcher(&self, wake_tx: mpsc::Sender<()>) -> Option<notify::RecommendedWatcher> {
        use notify::{RecursiveMode, Watcher};

        let mut watcher = notify::recommended_watcher(move |_: notify::Result<notify::Event>| {
            let _ = wake_tx.try_send(());
        })
        .ok()?;

        watcher.watch(&self.worktree_path, RecursiveMode::Recursive).ok()?;
        Some(watcher)
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
