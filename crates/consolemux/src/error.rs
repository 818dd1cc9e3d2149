// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-visible error codes (C10/§7), shared across every channel kind.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    WorkerNotFound,
    WorkerExited,
    HistoryLoadFailed,
    InvalidMessage,
    PtyBackpressure,
    CancelFailed,
    DiffBadRef,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkerNotFound => "WORKER_NOT_FOUND",
            Self::WorkerExited => "WORKER_EXITED",
            Self::HistoryLoadFailed => "HISTORY_LOAD_FAILED",
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::PtyBackpressure => "PTY_BACKPRESSURE",
            Self::CancelFailed => "CANCEL_FAILED",
            Self::DiffBadRef => "DIFF_BAD_REF",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
