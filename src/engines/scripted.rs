//! A deterministic, scriptable engine.
//!
//! [`ScriptedEngine`] implements every device-kind engine trait over an
//! in-memory event queue instead of a network connection. Its paired
//! [`EngineProbe`] feeds events in from the outside and watches what the
//! proxy layer does: how often the engine was drained, whether it was
//! shut down, which requests were issued. That makes it both the demo
//! backend and the call-count stub the concurrency tests are built on.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::config::ConnectParams;
use crate::devices::analog::{AnalogEngine, AnalogOutputEngine, AnalogUpdate};
use crate::devices::force::{ForceEngine, ForceEvent};
use crate::devices::function_generator::{GeneratorChannel, GeneratorEngine, GeneratorEvent};
use crate::devices::tracker::{TrackerEngine, TrackerEvent};
use crate::engine::{ConnectError, Engine, NoUpdate};
use crate::update::Timestamp;

struct State<Ev> {
    queue: Mutex<VecDeque<Ev>>,
    live: AtomicBool,
    connected: AtomicBool,
    okay: AtomicBool,
    accept_requests: AtomicBool,
    eof: AtomicBool,
    num_channels: AtomicUsize,

    mainloop_calls: AtomicUsize,
    shutdown_calls: AtomicUsize,
    status_calls: AtomicUsize,
    replay_calls: AtomicUsize,

    requests: Mutex<Vec<String>>,
    elapsed: Mutex<Duration>,
    replay_rate: Mutex<f64>,
    earliest: Mutex<Option<Timestamp>>,
    latest: Mutex<Option<Timestamp>>,
    length: Mutex<Option<Duration>>,
}

impl<Ev> State<Ev> {
    fn new(live: bool) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            live: AtomicBool::new(live),
            connected: AtomicBool::new(true),
            okay: AtomicBool::new(true),
            accept_requests: AtomicBool::new(true),
            eof: AtomicBool::new(false),
            num_channels: AtomicUsize::new(0),
            mainloop_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            replay_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            elapsed: Mutex::new(Duration::ZERO),
            replay_rate: Mutex::new(1.0),
            earliest: Mutex::new(None),
            latest: Mutex::new(None),
            length: Mutex::new(None),
        })
    }

    fn request(&self, what: String) -> bool {
        let accepted = self.accept_requests.load(Ordering::SeqCst);
        if accepted {
            self.requests
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(what);
        }
        accepted
    }
}

/// Engine half: hand this to a device facade.
pub struct ScriptedEngine<Ev> {
    state: Arc<State<Ev>>,
}

/// Probe half: feed events and observe engine traffic from the test or
/// demo side while the proxy owns the engine.
pub struct EngineProbe<Ev> {
    state: Arc<State<Ev>>,
}

impl<Ev: Send> ScriptedEngine<Ev> {
    /// A live-session engine plus its probe.
    pub fn live_pair() -> (Self, EngineProbe<Ev>) {
        Self::pair(true)
    }

    /// A replay-session engine plus its probe.
    pub fn replay_pair() -> (Self, EngineProbe<Ev>) {
        Self::pair(false)
    }

    fn pair(live: bool) -> (Self, EngineProbe<Ev>) {
        let state = State::new(live);
        (
            Self {
                state: Arc::clone(&state),
            },
            EngineProbe { state },
        )
    }
}

impl<Ev> EngineProbe<Ev> {
    /// Queues one event for the next drain.
    pub fn feed(&self, event: Ev) {
        self.state
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(event);
    }

    /// Queues several events, preserving order.
    pub fn feed_all(&self, events: impl IntoIterator<Item = Ev>) {
        let mut queue = self.state.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.extend(events);
    }

    /// Events queued but not yet drained.
    pub fn pending(&self) -> usize {
        self.state
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_doing_okay(&self, okay: bool) {
        self.state.okay.store(okay, Ordering::SeqCst);
    }

    /// When `false`, every request operation reports delivery failure.
    pub fn set_accept_requests(&self, accept: bool) {
        self.state.accept_requests.store(accept, Ordering::SeqCst);
    }

    pub fn set_eof(&self, eof: bool) {
        self.state.eof.store(eof, Ordering::SeqCst);
    }

    pub fn set_elapsed(&self, elapsed: Duration) {
        *self.state.elapsed.lock().unwrap_or_else(|e| e.into_inner()) = elapsed;
    }

    /// Session-file bounds reported to replay queries.
    pub fn set_session_bounds(&self, earliest: Timestamp, latest: Timestamp, length: Duration) {
        *self.state.earliest.lock().unwrap_or_else(|e| e.into_inner()) = Some(earliest);
        *self.state.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(latest);
        *self.state.length.lock().unwrap_or_else(|e| e.into_inner()) = Some(length);
    }

    pub fn set_num_active_channels(&self, n: usize) {
        self.state.num_channels.store(n, Ordering::SeqCst);
    }

    /// Last replay rate the proxy set.
    pub fn replay_rate(&self) -> f64 {
        *self.state.replay_rate.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every request operation issued so far, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of `mainloop` drains.
    pub fn mainloop_calls(&self) -> usize {
        self.state.mainloop_calls.load(Ordering::SeqCst)
    }

    /// Number of `shutdown` calls (the lifecycle invariant says this
    /// never exceeds one).
    pub fn shutdown_calls(&self) -> usize {
        self.state.shutdown_calls.load(Ordering::SeqCst)
    }

    /// Number of status queries (`is_connected`, `doing_okay`,
    /// `is_live`, `elapsed_time`).
    pub fn status_calls(&self) -> usize {
        self.state.status_calls.load(Ordering::SeqCst)
    }

    /// Number of replay-control calls that reached the engine.
    pub fn replay_calls(&self) -> usize {
        self.state.replay_calls.load(Ordering::SeqCst)
    }
}

impl<Ev: Send + 'static> Engine for ScriptedEngine<Ev> {
    type Event = Ev;

    /// Always connects, as a live session. Use
    /// [`ScriptedEngine::live_pair`]/[`replay_pair`](ScriptedEngine::replay_pair)
    /// instead when the caller needs the probe.
    fn connect(_params: &ConnectParams) -> Result<Self, ConnectError> {
        Ok(Self {
            state: State::new(true),
        })
    }

    fn mainloop(&mut self) -> Vec<Ev> {
        self.state.mainloop_calls.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.state.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.drain(..).collect()
    }

    fn shutdown(&mut self) {
        self.state.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        self.state.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&mut self) -> bool {
        self.state.status_calls.fetch_add(1, Ordering::SeqCst);
        self.state.connected.load(Ordering::SeqCst)
    }

    fn doing_okay(&mut self) -> bool {
        self.state.status_calls.fetch_add(1, Ordering::SeqCst);
        self.state.okay.load(Ordering::SeqCst)
    }

    fn is_live(&mut self) -> bool {
        self.state.status_calls.fetch_add(1, Ordering::SeqCst);
        self.state.live.load(Ordering::SeqCst)
    }

    fn elapsed_time(&mut self) -> Duration {
        self.state.status_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reset(&mut self) -> bool {
        self.state.replay_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.elapsed.lock().unwrap_or_else(|e| e.into_inner()) = Duration::ZERO;
        self.state.eof.store(false, Ordering::SeqCst);
        true
    }

    fn eof(&mut self) -> bool {
        self.state.replay_calls.fetch_add(1, Ordering::SeqCst);
        self.state.eof.load(Ordering::SeqCst)
    }

    fn set_replay_rate(&mut self, rate: f64) -> bool {
        self.state.replay_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.replay_rate.lock().unwrap_or_else(|e| e.into_inner()) = rate;
        true
    }

    fn play_to_elapsed_time(&mut self, t: Duration) -> bool {
        self.state.replay_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.elapsed.lock().unwrap_or_else(|e| e.into_inner()) = t;
        true
    }

    fn play_to_wall_time(&mut self, _t: SystemTime) -> bool {
        self.state.replay_calls.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn earliest_time(&mut self) -> Option<Timestamp> {
        self.state.replay_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.earliest.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn latest_time(&mut self) -> Option<Timestamp> {
        self.state.replay_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.latest.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn length(&mut self) -> Option<Duration> {
        self.state.replay_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.length.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TrackerEngine for ScriptedEngine<TrackerEvent> {
    fn set_update_rate(&mut self, rate: f64) -> bool {
        self.state.request(format!("set_update_rate({rate})"))
    }
}

impl AnalogEngine for ScriptedEngine<AnalogUpdate> {
    fn num_active_channels(&mut self) -> usize {
        self.state.num_channels.load(Ordering::SeqCst)
    }
}

impl AnalogOutputEngine for ScriptedEngine<NoUpdate> {
    fn request_value_change(&mut self, channel: usize, value: f64) -> bool {
        self.state
            .request(format!("request_value_change({channel}, {value})"))
    }

    fn request_value_change_all(&mut self, values: &[f64]) -> bool {
        self.state
            .request(format!("request_value_change_all({values:?})"))
    }

    fn num_active_channels(&mut self) -> usize {
        self.state.num_channels.load(Ordering::SeqCst)
    }
}

impl ForceEngine for ScriptedEngine<ForceEvent> {
    fn start_surface(&mut self) -> bool {
        self.state.request("start_surface".into())
    }

    fn stop_surface(&mut self) -> bool {
        self.state.request("stop_surface".into())
    }

    fn send_force_field(
        &mut self,
        origin: [f64; 3],
        force: [f64; 3],
        _jacobian: [[f64; 3]; 3],
        radius: f64,
    ) -> bool {
        self.state
            .request(format!("send_force_field({origin:?}, {force:?}, {radius})"))
    }

    fn stop_force_field(&mut self) -> bool {
        self.state.request("stop_force_field".into())
    }
}

impl GeneratorEngine for ScriptedEngine<GeneratorEvent> {
    fn set_channel(&mut self, index: u32, channel: &GeneratorChannel) -> bool {
        self.state
            .request(format!("set_channel({index}, {:?})", channel.function))
    }

    fn request_channel(&mut self, index: u32) -> bool {
        self.state.request(format!("request_channel({index})"))
    }

    fn request_all_channels(&mut self) -> bool {
        self.state.request("request_all_channels".into())
    }

    fn request_start(&mut self) -> bool {
        self.state.request("request_start".into())
    }

    fn request_stop_generating(&mut self) -> bool {
        self.state.request("request_stop".into())
    }

    fn request_sample_rate(&mut self, rate: f64) -> bool {
        self.state.request(format!("request_sample_rate({rate})"))
    }
}
