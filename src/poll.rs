//! The background poll loop.
//!
//! Each device proxy runs one dedicated thread that periodically drains
//! the engine: take the call gate, run `mainloop`, deliver the drained
//! updates, release, sleep, repeat. [`PollLoop`] owns that thread and the
//! small state machine around it; the actual drain work is a closure
//! supplied by the proxy.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

/// Lifecycle of the poll thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    /// Constructed, thread not yet spawned.
    Idle,
    /// Thread spawned and iterating.
    Running,
    /// Stop requested, waiting for the current iteration to finish.
    Stopping,
    /// Thread exited (or was never started) and the stop action ran.
    /// Terminal.
    Stopped,
}

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;
const STOPPED: u8 = 3;

struct Shared {
    state: AtomicU8,
    period_ms: AtomicU64,
}

impl Shared {
    fn state(&self) -> PollState {
        match self.state.load(Ordering::Acquire) {
            IDLE => PollState::Idle,
            RUNNING => PollState::Running,
            STOPPING => PollState::Stopping,
            _ => PollState::Stopped,
        }
    }
}

struct ThreadSlot {
    handle: Option<JoinHandle<()>>,
    on_stopped: Option<Box<dyn FnOnce() + Send>>,
}

/// Periodic driver of one device's engine drain.
///
/// The sleep between iterations is interruptible: a spurious wakeup just
/// causes an early next iteration. The period can be changed at any time
/// and takes effect at the next sleep.
pub struct PollLoop {
    shared: Arc<Shared>,
    slot: Mutex<ThreadSlot>,
}

impl PollLoop {
    /// Creates an idle loop. `on_stopped` runs exactly once, after the
    /// thread has fully exited (or on stop of a never-started loop); the
    /// proxy uses it to shut the engine down once the poller can no
    /// longer touch it.
    pub fn new(period: Duration, on_stopped: impl FnOnce() + Send + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(IDLE),
                period_ms: AtomicU64::new(period.as_millis() as u64),
            }),
            slot: Mutex::new(ThreadSlot {
                handle: None,
                on_stopped: Some(Box::new(on_stopped)),
            }),
        }
    }

    /// Spawns the poll thread. Not idempotent: calling it on a loop that
    /// is not idle is a no-op with a warning.
    pub fn start(&self, thread_name: String, mut tick: impl FnMut() + Send + 'static) {
        let mut slot = self.lock_slot();
        if self
            .shared
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(thread = %thread_name, state = ?self.shared.state(), "poll loop already started, ignoring");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                debug!("poll thread started");
                while shared.state.load(Ordering::Acquire) == RUNNING {
                    tick();
                    let period = Duration::from_millis(shared.period_ms.load(Ordering::Relaxed));
                    std::thread::park_timeout(period);
                }
                debug!("poll thread exiting");
            })
            .expect("failed to spawn poll thread");
        slot.handle = Some(handle);
    }

    /// Signals the loop to exit after its current iteration and blocks
    /// until the thread is gone, then runs the stop action. A second
    /// caller blocks until the first has finished and then returns; the
    /// stop action still runs only once.
    pub fn request_stop(&self) {
        let mut slot = self.lock_slot();
        match self.shared.state.load(Ordering::Acquire) {
            RUNNING => {
                self.shared.state.store(STOPPING, Ordering::Release);
                if let Some(handle) = slot.handle.take() {
                    handle.thread().unpark();
                    if handle.join().is_err() {
                        // Tick panics are isolated at dispatch; anything
                        // that still escapes is logged and treated as a
                        // clean-enough exit.
                        warn!("poll thread exited by panic");
                    }
                }
                self.shared.state.store(STOPPED, Ordering::Release);
            }
            IDLE => {
                self.shared.state.store(STOPPED, Ordering::Release);
            }
            _ => return,
        }
        if let Some(on_stopped) = slot.on_stopped.take() {
            on_stopped();
        }
    }

    /// Current interval between iterations.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.shared.period_ms.load(Ordering::Relaxed))
    }

    /// Sets the interval between iterations, effective from the next
    /// sleep.
    pub fn set_period(&self, period: Duration) {
        self.shared
            .period_ms
            .store(period.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn state(&self) -> PollState {
        self.shared.state()
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, ThreadSlot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}
