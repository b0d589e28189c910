//! The engine contract and the call gate that serializes access to it.
//!
//! An [`Engine`] is one open connection to the native device-I/O system.
//! Connection management, the wire protocol, and the device drivers all
//! live on the other side of this trait; this crate only drains it, issues
//! requests through it, and shuts it down.

use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::config::ConnectParams;
use crate::update::Timestamp;

/// Failure to open an engine connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The native layer for this device type is missing or incompatible.
    #[error("no engine support for {0}")]
    Unsupported(String),

    /// The engine refused or could not reach the named device.
    #[error("connection failed: {0}")]
    Refused(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Event type for request-only devices: their drain never yields updates.
#[derive(Clone, Copy, Debug)]
pub enum NoUpdate {}

/// One connection to the native engine, for a single device.
///
/// `mainloop` drains whatever messages are pending and returns them as
/// typed events; the poll loop routes them to the listeners. All methods
/// take `&mut self` because the native side is stateful: callers reach an
/// engine only through its [`CallGate`], which guarantees exclusive access.
///
/// The replay-control surface has defaults that report "not supported", so
/// live-only engines implement just the connection and drain methods.
pub trait Engine: Send {
    /// Event type produced by `mainloop` for this device kind.
    type Event: Send + 'static;

    /// Opens the connection described by `params`.
    fn connect(params: &ConnectParams) -> Result<Self, ConnectError>
    where
        Self: Sized;

    /// Drains pending messages, returning them in arrival order.
    fn mainloop(&mut self) -> Vec<Self::Event>;

    /// Releases the native connection. Called exactly once.
    fn shutdown(&mut self);

    /// Whether the connection to the server is currently up.
    fn is_connected(&mut self) -> bool;

    /// Whether the engine considers the session healthy.
    fn doing_okay(&mut self) -> bool;

    /// `true` for a real-time session, `false` for recorded-session
    /// playback. A session's nature never changes, so callers cache this.
    fn is_live(&mut self) -> bool;

    /// Time elapsed since the session started. Valid live or in replay.
    fn elapsed_time(&mut self) -> Duration;

    // Replay-control surface. Only meaningful when `is_live()` is false;
    // the proxy layer gates every call on that.

    /// Rewinds playback to the beginning of the session file.
    fn reset(&mut self) -> bool {
        false
    }

    /// Whether playback has reached the end of the session file.
    fn eof(&mut self) -> bool {
        false
    }

    /// Sets the playback rate as a fraction of wall-clock time
    /// (0.0 = paused, 1.0 = normal speed).
    fn set_replay_rate(&mut self, _rate: f64) -> bool {
        false
    }

    /// Plays forward until the given session-elapsed time.
    fn play_to_elapsed_time(&mut self, _t: Duration) -> bool {
        false
    }

    /// Plays forward until the given wall-clock time.
    fn play_to_wall_time(&mut self, _t: SystemTime) -> bool {
        false
    }

    /// Stamp of the earliest user message in the session file.
    fn earliest_time(&mut self) -> Option<Timestamp> {
        None
    }

    /// Stamp of the latest user message in the session file.
    fn latest_time(&mut self) -> Option<Timestamp> {
        None
    }

    /// Total length of the session file.
    fn length(&mut self) -> Option<Duration> {
        None
    }
}

/// Mutual-exclusion gate around one engine.
///
/// Every call into the engine — from the poll loop and from application
/// threads issuing requests — goes through [`CallGate::with`], so a request
/// made concurrently with a poll happens fully before or fully after that
/// poll's drain, never mid-call. The gate is not reentrant: acquire it at
/// the outermost point only.
pub struct CallGate<E> {
    inner: std::sync::Mutex<E>,
}

impl<E> CallGate<E> {
    pub fn new(engine: E) -> Self {
        Self {
            inner: std::sync::Mutex::new(engine),
        }
    }

    /// Runs `f` with exclusive access to the engine, blocking until the
    /// gate is free. A poisoned gate (a previous holder panicked) is
    /// recovered rather than propagated; listener panics are already
    /// isolated at dispatch, so the engine state is still coherent.
    pub fn with<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        let mut engine = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut engine)
    }
}
