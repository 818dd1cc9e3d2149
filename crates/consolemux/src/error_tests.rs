// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn as_str_matches_wire_codes() {
    assert_eq!(ErrorCode::WorkerNotFound.as_str(), "WORKER_NOT_FOUND");
    assert_eq!(ErrorCode::WorkerExited.as_str(), "WORKER_EXITED");
    assert_eq!(ErrorCode::HistoryLoadFailed.as_str(), "HISTORY_LOAD_FAILED");
    assert_eq!(ErrorCode::InvalidMessage.as_str(), "INVALID_MESSAGE");
    assert_eq!(ErrorCode::PtyBackpressure.as_str(), "PTY_BACKPRESSURE");
    assert_eq!(ErrorCode::CancelFailed.as_str(), "CANCEL_FAILED");
    assert_eq!(ErrorCode::DiffBadRef.as_str(), "DIFF_BAD_REF");
}

#[test]
fn display_matches_as_str() {
    assert_eq!(ErrorCode::CancelFailed.to_string(), ErrorCode::CancelFailed.as_str());
}
