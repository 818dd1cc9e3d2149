// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::ffi::CString;
use std::os::fd::{AsRawFd, RawFd};
use std::path::Path;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use bytes::Bytes;
use nix::libc;
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{chdir, execvp, ForkResult, Pid};
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;

use super::nbio::{read_chunk, set_nonblocking, write_all, PtyFd};
use super::{Backend, ExitStatus};

/// Native PTY backend that spawns a child process via `forkpty`.
pub struct NativePty {
    master: AsyncFd<PtyFd>,
    child_pid: Pid,
    cols: Arc<AtomicU16>,
    rows: Arc<AtomicU16>,
}

impl NativePty {
    /// Spawn `cmd` with `args` on a new PTY sized `cols` x `rows`.
    ///
    /// `env` is applied on top of the child's inherited environment before
    /// exec; `cwd` changes the child's working directory, if given.
    // forkpty requires unsafe: post-fork child is partially initialized
    #[allow(unsafe_code)]
    pub fn spawn(
        cmd: &str,
        args: &[String],
        env: &[(String, String)],
        cwd: Option<&Path>,
        cols: u16,
        rows: u16,
    ) -> anyhow::Result<Self> {
        let winsize = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

        // SAFETY: forkpty is unsafe because the child is in a
        // partially-initialized state after fork. We immediately chdir,
        // set env, and exec without allocating or touching shared state.
        let result = unsafe { forkpty(&winsize, None) }.context("forkpty failed")?;
        let ForkptyResult { master, fork_result } = result;

        match fork_result {
            ForkResult::Child => {
                if let Some(dir) = cwd {
                    if chdir(dir).is_err() {
                        libc_exit(127);
                    }
                }
                std::env::set_var("TERM", "xterm-256color");
                for (k, v) in env {
                    std::env::set_var(k, v);
                }

                let c_cmd = match CString::new(cmd.as_bytes()) {
                    Ok(c) => c,
                    Err(_) => libc_exit(127),
                };
                let mut c_args = Vec::with_capacity(args.len() + 1);
                c_args.push(c_cmd.clone());
                for a in args {
                    match CString::new(a.as_bytes()) {
                        Ok(c) => c_args.push(c),
                        Err(_) => libc_exit(127),
                    }
                }

                let _ = execvp(&c_cmd, &c_args);
                // execvp only returns on failure.
                libc_exit(127);
            }
            ForkResult::Parent { child } => {
                set_nonblocking(&master)?;
                let afd = AsyncFd::new(PtyFd(master)).context("AsyncFd::new failed")?;
                Ok(Self {
                    master: afd,
                    child_pid: child,
                    cols: Arc::new(AtomicU16::new(cols)),
                    rows: Arc::new(AtomicU16::new(rows)),
                })
            }
        }
    }
}

/// A handle to resize and query a running PTY, independent of [`NativePty`]
/// itself — it holds a raw fd and `Arc`-shared atomics rather than a
/// reference, so it carries no borrow on the backend and can be grabbed
/// before handing the backend's ownership off to its `run` task.
#[derive(Clone)]
pub struct PtyControl {
    master_fd: RawFd,
    child_pid: u32,
    cols: Arc<AtomicU16>,
    rows: Arc<AtomicU16>,
}

impl PtyControl {
    pub fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        self.cols.store(cols, Ordering::Relaxed);
        self.rows.store(rows, Ordering::Relaxed);
        set_winsize(self.master_fd, cols, rows)
    }

    pub fn child_pid(&self) -> Option<u32> {
        Some(self.child_pid)
    }

    /// Send `signal` to the child process directly, independent of the
    /// backend's `run` future or its eventual `Drop`. Used by the engine to
    /// tear down a PTY on an explicit shutdown/restart rather than waiting
    /// for every `WorkerHandle` clone to be dropped.
    pub fn kill(&self, signal: Signal) -> anyhow::Result<()> {
        kill(Pid::from_raw(self.child_pid as i32), signal).context("kill failed")
    }
}

// TIOCSWINSZ ioctl requires unsafe for the libc::ioctl call
#[allow(unsafe_code)]
fn set_winsize(fd: RawFd, cols: u16, rows: u16) -> anyhow::Result<()> {
    let ws = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

    // SAFETY: TIOCSWINSZ is a well-defined ioctl that sets the window size
    // on the PTY master fd. The Winsize struct is fully initialized, and the
    // fd is kept open by whoever holds the `NativePty`/`Backend` this
    // control handle was derived from.
    let ret = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &ws) };
    if ret < 0 {
        bail!("TIOCSWINSZ ioctl failed: {}", std::io::Error::last_os_error());
    }
    Ok(())
}

/// Exit the child immediately without running destructors, used only on the
/// post-fork child path when setup fails before exec.
fn libc_exit(code: i32) -> ! {
    // SAFETY: _exit is async-signal-safe and appropriate for a forked child
    // that must not run parent destructors.
    #[allow(unsafe_code)]
    unsafe {
        libc::_exit(code)
    }
}

impl Backend for NativePty {
    fn run(
        &mut self,
        output_tx: mpsc::Sender<Bytes>,
        mut input_rx: mpsc::Receiver<Bytes>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<ExitStatus>> + Send + '_>>
    {
        let pid = self.child_pid;
        Box::pin(async move {
            let mut buf = vec![0u8; 8192];
            let mut input_closed = false;

            loop {
                if input_closed {
                    match read_chunk(&self.master, &mut buf).await {
                        Ok(0) => break,
                        Ok(n) => {
                            let data = Bytes::copy_from_slice(&buf[..n]);
                            if output_tx.send(data).await.is_err() {
                                break;
                            }
                        }
                        Err(e) if e.raw_os_error() == Some(libc::EIO) => break,
                        Err(e) => return Err(e.into()),
                    }
                } else {
                    tokio::select! {
                        result = read_chunk(&self.master, &mut buf) => {
                            match result {
                                Ok(0) => break,
                                Ok(n) => {
                                    let data = Bytes::copy_from_slice(&buf[..n]);
                                    if output_tx.send(data).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) if e.raw_os_error() == Some(libc::EIO) => break,
                                Err(e) => return Err(e.into()),
                            }
                        }
                        input = input_rx.recv() => {
                            match input {
                                Some(data) => {
                                    write_all(&self.master, &data).await?;
                                }
                                None => input_closed = true,
                            }
                        }
                    }
                }
            }

            let status = tokio::task::spawn_blocking(move || wait_for_exit(pid))
                .await
                .context("join wait thread")??;
            Ok(status)
        })
    }

    fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        self.cols.store(cols, Ordering::Relaxed);
        self.rows.store(rows, Ordering::Relaxed);
        set_winsize(self.master.as_raw_fd(), cols, rows)
    }

    fn child_pid(&self) -> Option<u32> {
        Some(self.child_pid.as_raw() as u32)
    }

    fn control(&self) -> PtyControl {
        PtyControl {
            master_fd: self.master.as_raw_fd(),
            child_pid: self.child_pid.as_raw() as u32,
            cols: Arc::clone(&self.cols),
            rows: Arc::clone(&self.rows),
        }
    }
}

impl Drop for NativePty {
    fn drop(&mut self) {
        let _ = kill(self.child_pid, Signal::SIGHUP);
        std::thread::sleep(std::time::Duration::from_millis(50));
        let _ = kill(self.child_pid, Signal::SIGKILL);
        let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
    }
}

/// Block until the child exits and convert to our `ExitStatus`.
fn wait_for_exit(pid: Pid) -> anyhow::Result<ExitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ExitStatus { code: Some(code), signal: None }),
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                return Ok(ExitStatus { code: None, signal: Some(sig as i32) })
            }
            Ok(_) => continue,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => bail!("waitpid failed: {e}"),
        }
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
