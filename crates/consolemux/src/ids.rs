// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier and clock helpers (C9): session/worker ids, the server
//! instance id echoed in `history` frames, and millisecond timestamps.

/// Generate a fresh opaque session or worker id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A server instance id, chosen once at process start. Clients compare this
/// against the value they last saw to detect that the server restarted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInstanceId(String);

impl ServerInstanceId {
    /// Choose a fresh random instance id.
    pub fn fresh() -> Self {
        Self(format!("sv-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
