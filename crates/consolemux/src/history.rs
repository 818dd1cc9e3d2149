// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded, append-only history buffer for worker output (C2).
//!
//! Physically a fixed-capacity ring over the last `CAP` bytes ever written,
//! addressed by a monotonic global byte offset that never rewinds except on
//! an explicit [`HistoryBuffer::clear`] (worker restart).

/// Default capacity for a worker's history buffer: 2 MiB.
pub const DEFAULT_CAP_BYTES: usize = 2 * 1024 * 1024;

/// A snapshot of buffered output returned to a new or resuming reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub bytes: Vec<u8>,
    pub from_offset: u64,
    pub tail_offset: u64,
    pub truncated: bool,
}

/// Fixed-capacity circular byte buffer with a monotonic append offset.
#[derive(Debug)]
pub struct HistoryBuffer {
    buf: Vec<u8>,
    capacity: usize,
    write_pos: usize,
    tail_offset: u64,
    /// Global offset of the oldest byte still retained. Advances with the
    /// ring but is also bumped directly to `tail_offset` on `clear()`.
    head: u64,
}

impl HistoryBuffer {
    /// Create a new history buffer with the given capacity in bytes.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { buf: vec![0u8; capacity], capacity, write_pos: 0, tail_offset: 0, head: 0 }
    }

    /// Append bytes, evicting the oldest data to respect `capacity`.
    pub fn append(&mut self, data: &[u8]) -> u64 {
        for chunk in data.chunks(self.capacity) {
            let start = self.write_pos;
            let end = start + chunk.len();

            if end <= self.capacity {
                self.buf[start..end].copy_from_slice(chunk);
            } else {
                let first = self.capacity - start;
                self.buf[start..self.capacity].copy_from_slice(&chunk[..first]);
                self.buf[..chunk.len() - first].copy_from_slice(&chunk[first..]);
            }

            self.write_pos = end % self.capacity;
            self.tail_offset += chunk.len() as u64;
        }
        self.head = self.tail_offset.saturating_sub(self.capacity as u64);
        self.tail_offset
    }

    /// Return a snapshot of everything retrievable from `from_offset`.
    ///
    /// If `from_offset < head`, returns the oldest retained bytes with
    /// `truncated = true`. If `from_offset > tail_offset`, clamps to
    /// `tail_offset` (nothing to return) rather than erroring — a client
    /// offset can only be ahead of the server after a restart, which the
    /// caller detects via `serverId`, not via this method.
    pub fn snapshot(&self, from_offset: u64) -> Snapshot {
        let truncated = from_offset < self.head;
        let from_offset = from_offset.min(self.tail_offset).max(self.head);
        let bytes = self.read_from(from_offset).unwrap_or_default();
        Snapshot { bytes, from_offset, tail_offset: self.tail_offset, truncated }
    }

    /// Read raw bytes from `offset` to `tail_offset`. `None` if `offset` is
    /// outside `[head, tail_offset]`.
    fn read_from(&self, offset: u64) -> Option<Vec<u8>> {
        if offset > self.tail_offset || offset < self.head {
            return None;
        }
        let available = (self.tail_offset - offset) as usize;
        if available == 0 {
            return Some(Vec::new());
        }

        let start = if self.write_pos >= available {
            self.write_pos - available
        } else {
            self.capacity - (available - self.write_pos)
        };

        let mut out = Vec::with_capacity(available);
        if start + available <= self.capacity {
            out.extend_from_slice(&self.buf[start..start + available]);
        } else {
            let first = self.capacity - start;
            out.extend_from_slice(&self.buf[start..self.capacity]);
            out.extend_from_slice(&self.buf[..available - first]);
        }
        Some(out)
    }

    /// Reset the buffer to a brand new logical stream starting at offset 0.
    ///
    /// Used when a Worker is restarted: per the data model, `tailOffset`
    /// resets to 0 only on restart (never simply rewinds within one logical
    /// stream). Callers must not call `clear()` for any other reason.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.tail_offset = 0;
        self.head = 0;
        self.buf.iter_mut().for_each(|b| *b = 0);
    }

    /// Total bytes ever appended (the current tail offset).
    pub fn tail_offset(&self) -> u64 {
        self.tail_offset
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
