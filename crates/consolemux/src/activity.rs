// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent activity detector (C3).
//!
//! Classifies a Worker's terminal output into `unknown` / `idle` / `active`
//! / `asking` and emits edge-triggered `worker-activity` transitions.

use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Debounced evaluator cadence: the detector re-classifies at most this
/// often even if output arrives faster.
pub const EVAL_DEBOUNCE: Duration = Duration::from_millis(100);

/// Default window of recency within which output keeps a worker `active`.
pub const DEFAULT_T_ACTIVE: Duration = Duration::from_millis(750);

/// Classified activity state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentActivityState {
    Unknown,
    Idle,
    Active,
    Asking,
}

impl AgentActivityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Asking => "asking",
        }
    }
}

impl std::fmt::Display for AgentActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-worker activity detector. Not `Send`-shared: owned by the worker
/// engine task and driven from its single event loop.
pub struct ActivityDetector {
    asking_patterns: Vec<Regex>,
    t_active: Duration,
    debounce: Duration,
    state: AgentActivityState,
    ever_active_or_asking: bool,
    last_output_at: Option<tokio::time::Instant>,
    last_eval_at: Option<tokio::time::Instant>,
    suspended: bool,
}

impl ActivityDetector {
    pub fn new(asking_patterns: Vec<Regex>, t_active: Duration, debounce: Duration) -> Self {
        Self {
            asking_patterns,
            t_active,
            debounce,
            state: AgentActivityState::Unknown,
            ever_active_or_asking: false,
            last_output_at: None,
            last_eval_at: None,
            suspended: false,
        }
    }

    pub fn with_defaults(asking_patterns: Vec<Regex>) -> Self {
        Self::new(asking_patterns, DEFAULT_T_ACTIVE, EVAL_DEBOUNCE)
    }

    pub fn state(&self) -> AgentActivityState {
        self.state
    }

    /// Record that at least one byte of output was emitted just now.
    pub fn note_output(&mut self, now: tokio::time::Instant) {
        if self.suspended {
            return;
        }
        self.last_output_at = Some(now);
    }

    /// Re-classify against the current visible tail, honoring the debounce
    /// window. Returns `Some(new_state)` only on an edge (state actually
    /// changed); `None` if debounced, suspended, or unchanged.
    pub fn evaluate(&mut self, now: tokio::time::Instant, visible_tail: &str) -> Option<AgentActivityState> {
        if self.suspended {
            return None;
        }
        if let Some(last) = self.last_eval_at {
            if now.duration_since(last) < self.debounce {
                return None;
            }
        }
        self.last_eval_at = Some(now);

        let next = if self.asking_patterns.iter().any(|re| re.is_match(visible_tail)) {
            AgentActivityState::Asking
        } else if self.last_output_at.is_some_and(|t| now.duration_since(t) < self.t_active) {
            AgentActivityState::Active
        } else if self.ever_active_or_asking {
            AgentActivityState::Idle
        } else {
            AgentActivityState::Unknown
        };

        if matches!(next, AgentActivityState::Active | AgentActivityState::Asking) {
            self.ever_active_or_asking = true;
        }

        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }

    /// Stop classifying after the worker's backend has exited.
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
