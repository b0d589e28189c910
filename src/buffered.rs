//! Buffered update consumption.
//!
//! A [`BufferedListener`] decouples listener-style delivery from
//! poll-style consumption: the device's poll thread stores updates into
//! it, and the application drains them whenever convenient, choosing
//! between "only the newest value" and "everything since I last asked".

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::config::DeviceName;
use crate::dispatcher::UpdateListener;

/// Retention policy for a [`BufferedListener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferMode {
    /// Keep only the most recent update. [`BufferedListener::drain`]
    /// returns it without consuming it, so repeated drains with no new
    /// delivery return the same record again.
    Last,
    /// Keep every update. `drain` returns the whole backlog in delivery
    /// order and clears it.
    All,
}

struct Buffer<U> {
    mode: BufferMode,
    queue: VecDeque<U>,
    newest: Option<U>,
}

/// Listener adapter that stores updates for later retrieval.
///
/// All operations, including the delivery path, are mutually exclusive
/// under one internal lock, independent of any dispatcher lock — so the
/// application can drain from any thread while the poll thread keeps
/// delivering.
pub struct BufferedListener<U> {
    buffer: Mutex<Buffer<U>>,
}

impl<U: Clone> BufferedListener<U> {
    pub fn new(mode: BufferMode) -> Self {
        Self {
            buffer: Mutex::new(Buffer {
                mode,
                queue: VecDeque::new(),
                newest: None,
            }),
        }
    }

    /// Shorthand for `new(BufferMode::Last)`.
    pub fn latest_only() -> Self {
        Self::new(BufferMode::Last)
    }

    /// Shorthand for `new(BufferMode::All)`.
    pub fn keep_all() -> Self {
        Self::new(BufferMode::All)
    }

    pub fn mode(&self) -> BufferMode {
        self.lock().mode
    }

    /// Changes the retention policy.
    ///
    /// Switching to [`BufferMode::Last`] immediately collapses the backlog
    /// to its single most recent record. Switching to [`BufferMode::All`]
    /// does not synthesize history: a single buffered record, if present,
    /// becomes the first element of the new sequence and accumulation
    /// starts from there.
    pub fn set_mode(&self, mode: BufferMode) {
        let mut buf = self.lock();
        buf.mode = mode;
        if mode == BufferMode::Last && buf.queue.len() > 1 {
            let keep = buf.queue.pop_back();
            buf.queue.clear();
            buf.queue.extend(keep);
        }
    }

    /// Takes the buffered updates.
    ///
    /// In `Last` mode this returns the stored record (if any) without
    /// clearing it. In `All` mode it returns the entire backlog in
    /// delivery order and clears it, atomically with the read.
    pub fn drain(&self) -> Vec<U> {
        let mut buf = self.lock();
        match buf.mode {
            BufferMode::Last => buf.queue.back().cloned().into_iter().collect(),
            BufferMode::All => buf.queue.drain(..).collect(),
        }
    }

    /// The most recently delivered update, regardless of mode or drains.
    /// `None` only if nothing has ever been delivered.
    pub fn peek_last(&self) -> Option<U> {
        self.lock().newest.clone()
    }

    /// Number of records a `drain` would currently return.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Buffer<U>> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<U: Clone + Send> UpdateListener<U> for BufferedListener<U> {
    fn on_update(&self, update: &U, _source: &DeviceName) {
        let mut buf = self.lock();
        if buf.mode == BufferMode::Last {
            buf.queue.clear();
        }
        buf.queue.push_back(update.clone());
        buf.newest = Some(update.clone());
    }
}
