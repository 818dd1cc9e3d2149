// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol codec (C8): typed, internally-tagged JSON envelopes for every
//! channel kind, plus close-code constants (§6.1).

use serde::{Deserialize, Serialize};

use crate::activity::AgentActivityState;
use crate::gitdiff::{DiffSummary, TargetRef};
use crate::model::{AgentDefinition, SdkMessage, Session, WorkerActivitySnapshot};

// ---------------------------------------------------------------------
// App channel (`/ws/app`)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum AppServerMessage {
    SessionsSync { sessions: Vec<Session>, activity_states: Vec<WorkerActivitySnapshot> },
    SessionCreated { session: Session },
    SessionUpdated { session: Session },
    SessionDeleted { session_id: String },
    WorkerActivity { session_id: String, worker_id: String, activity_state: AgentActivityState },
    AgentsSync { agents: Vec<AgentDefinition> },
    AgentCreated { agent: AgentDefinition },
    AgentUpdated { agent: AgentDefinition },
    AgentDeleted { agent_id: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AppClientMessage {
    RequestSync {},
}

// ---------------------------------------------------------------------
// Worker channel (terminal/agent workers)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum WorkerServerMessage {
    History { data: String, offset: u64, server_id: String, truncated: bool },
    Output { data: String, offset: u64 },
    Activity { state: AgentActivityState },
    Exit { exit_code: i32, signal: Option<String> },
    Error { message: String, #[serde(skip_serializing_if = "Option::is_none")] code: Option<String> },
    SdkMessage { message: SdkMessage },
    MessageHistory { messages: Vec<SdkMessage>, last_uuid: Option<String> },
    ServerRestarted { server_pid: u32 },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum WorkerClientMessage {
    Input { data: String },
    Resize { cols: u16, rows: u16 },
    Image { data: String, mime_type: String },
    RequestHistory { #[serde(default)] from_offset: Option<u64> },
    UserMessage { content: String },
    Cancel {},
    RequestSdkHistory { #[serde(default)] last_uuid: Option<String> },
}

// ---------------------------------------------------------------------
// Git-diff worker channel
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum GitDiffServerMessage {
    DiffData { data: GitDiffData },
    DiffError { error: String },
    ExpandedLines { path: String, start_line: u32, lines: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitDiffData {
    pub summary: DiffSummary,
    pub raw_diff: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum GitDiffClientMessage {
    Refresh {},
    SetBaseCommit { #[serde(rename = "ref")] git_ref: String },
    SetTargetCommit { #[serde(rename = "ref")] target: String },
    RequestExpand { path: String, start_line: u32, end_line: u32 },
}

impl GitDiffClientMessage {
    /// Parse `target` into a [`TargetRef`], per the wire contract
    /// `'working-dir' | 'HEAD' | <hash>`.
    pub fn parse_target_ref(raw: &str) -> TargetRef {
        TargetRef::parse(raw)
    }
}

// ---------------------------------------------------------------------
// Close codes (§6.1)
// ---------------------------------------------------------------------

pub mod close_code {
    pub const NORMAL_CLOSURE: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const POLICY_VIOLATION: u16 = 1008;
    /// Distinguished reason used when a connection is closed for
    /// backpressure (queue overflow); any code other than the above should
    /// make clients reconnect with backoff.
    pub const BACKPRESSURE: u16 = 4000;
    /// Distinguished reason for idle-timeout closure of a worker channel.
    pub const IDLE_TIMEOUT: u16 = 4001;
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
