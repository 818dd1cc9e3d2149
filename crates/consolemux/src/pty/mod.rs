// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY adapter (C1): spawn a child process on a pseudo-terminal and stream
//! its output asynchronously.

pub mod nbio;
pub mod spawn;

pub use spawn::{NativePty, PtyControl};

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

/// How a spawned child exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Terminal backend abstraction. `NativePty` is the only implementation but
/// the worker engine is written against this trait so tests can substitute
/// a fake backend.
///
/// Object-safe for use as `Box<dyn Backend>`. `run` takes `&mut self` and
/// its returned future borrows the backend exclusively for the life of the
/// child process, so a caller that also needs to `resize` while `run` is
/// in flight must grab a [`PtyControl`] handle *before* calling `run` — it
/// duplicates only the raw fd and atomics `resize` touches, not the
/// `Backend` itself, so it carries no borrow on it.
pub trait Backend: Send + 'static {
    fn run(
        &mut self,
        output_tx: mpsc::Sender<Bytes>,
        input_rx: mpsc::Receiver<Bytes>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ExitStatus>> + Send + '_>>;

    fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()>;

    fn child_pid(&self) -> Option<u32>;

    /// A handle that can `resize` independently of `run`'s exclusive borrow.
    fn control(&self) -> PtyControl;
}
