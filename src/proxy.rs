//! The generic device proxy.
//!
//! A [`DeviceProxy`] ties together the pieces every device type shares:
//! the engine behind its [`CallGate`], the [`PollLoop`] that drains it,
//! the cached live/replay flag, and the shutdown sequencing. The typed
//! device facades in [`crate::devices`] each compose one of these with
//! their per-category dispatchers and expose it via `Deref`, so the
//! lifecycle and status API below is written exactly once.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::info;

use crate::config::DeviceName;
use crate::dispatcher::ListenerRegistry;
use crate::engine::{CallGate, ConnectError, Engine};
use crate::poll::{PollLoop, PollState};
use crate::update::Timestamp;

/// Lifecycle of a device proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProxyState {
    /// Constructed but the poll loop has not started. Proxies auto-start,
    /// so this is only observable from inside construction.
    Created,
    /// Poll loop running (or in the middle of stopping).
    Running,
    /// Poll loop joined and engine shut down. Terminal.
    Stopped,
}

/// Failures surfaced by the proxy layer.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The engine connection could not be created. Fatal to this proxy:
    /// no poll loop was started and the instance is unusable.
    #[error("failed to initialize device {name}")]
    Instantiation {
        name: DeviceName,
        #[source]
        source: ConnectError,
    },

    /// A replay-only operation was invoked on a live session. The proxy
    /// remains usable; check `is_replay()` first.
    #[error("`{op}` requires a replay session, but {name} is live")]
    NotReplay { name: DeviceName, op: &'static str },
}

/// Shared core of every device facade: engine + gate + poll loop +
/// lifecycle.
pub struct DeviceProxy<E: Engine> {
    name: DeviceName,
    gate: Arc<CallGate<E>>,
    poll: PollLoop,
    live: OnceCell<bool>,
}

impl<E: Engine + 'static> DeviceProxy<E> {
    /// Wires up the gate and poll loop around `engine` and starts
    /// polling. `route` is called under the gate for every event drained
    /// by `mainloop`; `registries` are wiped when the proxy stops.
    pub(crate) fn start(
        name: DeviceName,
        engine: E,
        registries: Vec<Arc<dyn ListenerRegistry>>,
        mut route: impl FnMut(E::Event, &DeviceName) + Send + 'static,
        period: Duration,
    ) -> Self {
        let gate = Arc::new(CallGate::new(engine));

        // Runs after the poll thread is joined, so the poller can no
        // longer touch the engine: wipe registrations, then release the
        // native side exactly once.
        let stop_gate = Arc::clone(&gate);
        let stop_name = name.clone();
        let poll = PollLoop::new(period, move || {
            for registry in &registries {
                registry.clear_listeners();
            }
            stop_gate.with(|engine| engine.shutdown());
            info!(device = %stop_name, "device proxy stopped");
        });

        let tick_gate = Arc::clone(&gate);
        let tick_name = name.clone();
        poll.start(format!("senslink-{}", name.device()), move || {
            tick_gate.with(|engine| {
                for event in engine.mainloop() {
                    route(event, &tick_name);
                }
            });
        });

        Self {
            name,
            gate,
            poll,
            live: OnceCell::new(),
        }
    }

    /// Gated access to the engine, for the typed facades' request
    /// methods. Never exposed to application code.
    pub(crate) fn gate(&self) -> &CallGate<E> {
        &self.gate
    }
}

impl<E: Engine> DeviceProxy<E> {
    /// The device address this proxy was opened with.
    pub fn name(&self) -> &DeviceName {
        &self.name
    }

    pub fn state(&self) -> ProxyState {
        match self.poll.state() {
            PollState::Idle => ProxyState::Created,
            PollState::Running | PollState::Stopping => ProxyState::Running,
            PollState::Stopped => ProxyState::Stopped,
        }
    }

    /// Stops the poll thread (blocking until it has exited), clears every
    /// listener registration, and shuts the engine down — exactly once,
    /// no matter how often this is called. Terminal; also run on drop.
    pub fn stop_running(&self) {
        self.poll.request_stop();
    }

    /// Interval between poll iterations.
    pub fn timer_period(&self) -> Duration {
        self.poll.period()
    }

    /// Sets the interval between poll iterations, effective from the
    /// next sleep.
    pub fn set_timer_period(&self, period: Duration) {
        self.poll.set_period(period);
    }

    /// Whether the connection to the server is currently up.
    pub fn is_connected(&self) -> bool {
        self.gate.with(|e| e.is_connected())
    }

    /// Whether the engine considers the session healthy.
    pub fn doing_okay(&self) -> bool {
        self.gate.with(|e| e.doing_okay())
    }

    /// Whether this is a real-time session. Queried from the engine once
    /// and cached: a session's nature cannot change.
    pub fn is_live(&self) -> bool {
        *self.live.get_or_init(|| self.gate.with(|e| e.is_live()))
    }

    /// Whether this is recorded-session playback.
    pub fn is_replay(&self) -> bool {
        !self.is_live()
    }

    /// Time elapsed since the session started. Valid live or in replay.
    pub fn elapsed_time(&self) -> Duration {
        self.gate.with(|e| e.elapsed_time())
    }

    // Replay-only operations. Each fails fast with
    // [`DeviceError::NotReplay`] on a live session, without touching the
    // engine.

    /// Rewinds playback to the beginning of the session file.
    pub fn reset(&self) -> Result<bool, DeviceError> {
        self.require_replay("reset")?;
        Ok(self.gate.with(|e| e.reset()))
    }

    /// Whether playback has reached the end of the session file.
    pub fn eof(&self) -> Result<bool, DeviceError> {
        self.require_replay("eof")?;
        Ok(self.gate.with(|e| e.eof()))
    }

    /// Sets the playback rate as a fraction of wall-clock time
    /// (0.0 = paused, 1.0 = normal speed).
    pub fn set_replay_rate(&self, rate: f64) -> Result<bool, DeviceError> {
        self.require_replay("set_replay_rate")?;
        Ok(self.gate.with(|e| e.set_replay_rate(rate)))
    }

    /// Plays forward until the given session-elapsed time.
    pub fn play_to_elapsed_time(&self, t: Duration) -> Result<bool, DeviceError> {
        self.require_replay("play_to_elapsed_time")?;
        Ok(self.gate.with(|e| e.play_to_elapsed_time(t)))
    }

    /// Plays forward until the given wall-clock time.
    pub fn play_to_wall_time(&self, t: SystemTime) -> Result<bool, DeviceError> {
        self.require_replay("play_to_wall_time")?;
        Ok(self.gate.with(|e| e.play_to_wall_time(t)))
    }

    /// Stamp of the earliest user message in the session file.
    pub fn earliest_time(&self) -> Result<Option<Timestamp>, DeviceError> {
        self.require_replay("earliest_time")?;
        Ok(self.gate.with(|e| e.earliest_time()))
    }

    /// Stamp of the latest user message in the session file.
    pub fn latest_time(&self) -> Result<Option<Timestamp>, DeviceError> {
        self.require_replay("latest_time")?;
        Ok(self.gate.with(|e| e.latest_time()))
    }

    /// Total length of the session file.
    pub fn length(&self) -> Result<Option<Duration>, DeviceError> {
        self.require_replay("length")?;
        Ok(self.gate.with(|e| e.length()))
    }

    fn require_replay(&self, op: &'static str) -> Result<(), DeviceError> {
        if self.is_live() {
            return Err(DeviceError::NotReplay {
                name: self.name.clone(),
                op,
            });
        }
        Ok(())
    }
}

impl<E: Engine> Drop for DeviceProxy<E> {
    fn drop(&mut self) {
        self.stop_running();
    }
}
