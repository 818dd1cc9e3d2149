// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared domain types (C3/C4/C5 data model): sessions, workers, and the
//! externally-supplied agent definitions the worker engine consumes.

use serde::{Deserialize, Serialize};

use crate::activity::AgentActivityState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Quick,
    Worktree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Exited,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerType {
    Terminal,
    Agent,
    GitDiff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetRef {
    WorkingDir,
    Head,
    Hash(String),
}

impl TargetRef {
    pub fn parse(s: &str) -> Self {
        match s {
            "working-dir" => Self::WorkingDir,
            "HEAD" => Self::Head,
            other => Self::Hash(other.to_owned()),
        }
    }
}

/// Type-specific fields carried by a Worker, per its `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum WorkerKindData {
    Terminal,
    Agent { agent_id: String, use_sdk: bool },
    GitDiff { base_commit: String, target_ref: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: WorkerType,
    pub name: String,
    pub created_at: u64,
    pub activated: bool,
    #[serde(flatten)]
    pub data: WorkerKindData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SessionType,
    pub location_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktree_id: Option<String>,
    pub status: SessionStatus,
    pub created_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_prompt: Option<String>,
    pub workers: Vec<String>,
}

/// Snapshot of one worker's activity state, as reported in `sessions-sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerActivitySnapshot {
    pub session_id: String,
    pub worker_id: String,
    pub activity_state: AgentActivityState,
}

/// Externally-supplied agent definition (§6.2) — consumed, never produced,
/// by the core. Read when constructing an agent worker's command line and
/// its activity detector patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    pub command_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headless_template: Option<String>,
    #[serde(default)]
    pub activity_patterns: ActivityPatterns,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    pub capabilities: AgentCapabilities,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPatterns {
    #[serde(default)]
    pub asking_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    pub supports_continue: bool,
    pub supports_headless_mode: bool,
    pub supports_activity_detection: bool,
}

/// A single turn in an SDK-mode agent's structured message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkMessage {
    pub uuid: String,
    pub role: SdkMessageRole,
    pub content: serde_json::Value,
    pub created_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdkMessageRole {
    User,
    Assistant,
    Result,
}
