// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration (C10 ambient stack): every tunable in spec
//! §6.3 plus host/port/log format/level, following the teacher's
//! `clap::Parser` + `env` fallback convention.

use clap::Parser;

/// Agent console server: owns PTY-backed sessions/workers and fans out
/// their state over WebSockets.
#[derive(Debug, Clone, Parser)]
#[command(name = "consolemux", version, about)]
pub struct Config {
    /// Host address to bind to.
    #[arg(long, env = "CONSOLEMUX_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP/WebSocket port to listen on.
    #[arg(long, env = "CONSOLEMUX_PORT", default_value = "7799")]
    pub port: u16,

    /// Bytes retained per worker's history buffer (§6.3 `historyCapBytes`).
    #[arg(long, env = "CONSOLEMUX_HISTORY_CAP_BYTES", default_value_t = crate::history::DEFAULT_CAP_BYTES)]
    pub history_cap_bytes: usize,

    /// Per-connection send queue cap, in frames (§6.3 `sendQueueFrames`).
    #[arg(long, env = "CONSOLEMUX_SEND_QUEUE_FRAMES", default_value_t = 256)]
    pub send_queue_frames: usize,

    /// Per-connection send queue cap, in bytes (§6.3 `sendQueueBytes`).
    #[arg(long, env = "CONSOLEMUX_SEND_QUEUE_BYTES", default_value_t = 4 * 1024 * 1024)]
    pub send_queue_bytes: usize,

    /// Idle worker channels are closed after this many seconds of no client
    /// frames and no server output (§6.3 `idleTimeoutSeconds`, §5).
    #[arg(long, env = "CONSOLEMUX_IDLE_TIMEOUT_SECONDS", default_value_t = 600)]
    pub idle_timeout_seconds: u64,

    /// Activity detector debounce window, in milliseconds
    /// (§6.3 `activityDebounceMs`).
    #[arg(long, env = "CONSOLEMUX_ACTIVITY_DEBOUNCE_MS", default_value_t = 100)]
    pub activity_debounce_ms: u64,

    /// `T_active` window, in milliseconds (§6.3 `activeWindowMs`).
    #[arg(long, env = "CONSOLEMUX_ACTIVE_WINDOW_MS", default_value_t = 750)]
    pub active_window_ms: u64,

    /// Per-worker PTY input buffer cap, in bytes (§6.3 `ptyWriteBufferBytes`).
    #[arg(long, env = "CONSOLEMUX_PTY_WRITE_BUFFER_BYTES", default_value_t = 64 * 1024)]
    pub pty_write_buffer_bytes: usize,

    /// App-channel `sessions-sync` debounce window, in milliseconds
    /// (§6.3 `syncDebounceMs`).
    #[arg(long, env = "CONSOLEMUX_SYNC_DEBOUNCE_MS", default_value_t = 50)]
    pub sync_debounce_ms: u64,

    /// Git worktree polling fallback cadence, in milliseconds (≤2 Hz cap).
    #[arg(long, env = "CONSOLEMUX_GITDIFF_POLL_MS", default_value_t = 500)]
    pub gitdiff_poll_ms: u64,

    /// Log format: `json` or `text`.
    #[arg(long, env = "CONSOLEMUX_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CONSOLEMUX_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn history_cap_bytes(&self) -> usize {
        self.history_cap_bytes
    }

    pub fn active_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.active_window_ms)
    }

    pub fn activity_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.activity_debounce_ms)
    }

    pub fn sync_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sync_debounce_ms)
    }

    pub fn idle_timeout(&self) -> Option<std::time::Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    pub fn gitdiff_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.gitdiff_poll_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
