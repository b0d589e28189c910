//! Listener registration and update fan-out.
//!
//! Each device proxy owns one [`UpdateDispatcher`] per update category
//! (position, velocity, button state, …). A dispatcher holds the
//! registered listeners for that category and delivers each update to all
//! of them, serialized: two dispatches of the same category never overlap,
//! even from different threads.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::config::DeviceName;

/// Receives update records for one category.
///
/// Listeners are called from the device's poll thread while it holds the
/// engine's call gate, so `on_update` must not invoke gated device
/// operations (status queries, replay control, requests) — stash the
/// record and act on it from another thread instead, or use a
/// [`BufferedListener`](crate::buffered::BufferedListener).
///
/// Implementations use interior mutability for any state they keep;
/// dispatch serialization guarantees at most one `on_update` call per
/// category is running at a time.
pub trait UpdateListener<U>: Send + Sync {
    fn on_update(&self, update: &U, source: &DeviceName);
}

/// Plain functions and closures are listeners.
impl<U, F> UpdateListener<U> for F
where
    F: Fn(&U, &DeviceName) + Send + Sync,
{
    fn on_update(&self, update: &U, source: &DeviceName) {
        self(update, source);
    }
}

/// Registered listeners for one update category of one device.
///
/// Membership is by `Arc` identity: registering the same `Arc` twice is
/// legal and results in two deliveries per update; `unregister` removes a
/// single occurrence.
pub struct UpdateDispatcher<U> {
    category: &'static str,
    listeners: Mutex<Vec<Arc<dyn UpdateListener<U>>>>,
}

impl<U> UpdateDispatcher<U> {
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// The category label, used in logs.
    pub fn category(&self) -> &'static str {
        self.category
    }

    /// Adds a listener at the end of the delivery order.
    pub fn register(&self, listener: Arc<dyn UpdateListener<U>>) {
        self.lock().push(listener);
    }

    /// Removes one occurrence of `listener`, comparing by `Arc` identity.
    /// Returns `false` if it was not registered.
    pub fn unregister(&self, listener: &Arc<dyn UpdateListener<U>>) -> bool {
        let mut listeners = self.lock();
        match listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(idx) => {
                listeners.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Drops every registration.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of registrations (duplicates counted).
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Delivers `update` to every listener, in registration order.
    ///
    /// The dispatcher's lock is held for the whole delivery, which is what
    /// serializes dispatches of this category against each other. A
    /// listener that panics is logged and skipped; the rest still run.
    pub fn dispatch(&self, update: &U, source: &DeviceName) {
        let listeners = self.lock();
        for listener in listeners.iter() {
            let delivery = catch_unwind(AssertUnwindSafe(|| listener.on_update(update, source)));
            if delivery.is_err() {
                warn!(
                    category = self.category,
                    device = %source,
                    "listener panicked during dispatch, continuing with remaining listeners"
                );
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn UpdateListener<U>>>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Object-safe view of a dispatcher used by the proxy to wipe
/// registrations at shutdown without knowing the update type.
pub(crate) trait ListenerRegistry: Send + Sync {
    fn clear_listeners(&self);
}

impl<U> ListenerRegistry for UpdateDispatcher<U> {
    fn clear_listeners(&self) {
        self.clear();
    }
}

/// Wraps a listener and forwards only the updates matching a predicate.
pub struct FilteredListener<U> {
    predicate: Box<dyn Fn(&U) -> bool + Send + Sync>,
    inner: Arc<dyn UpdateListener<U>>,
}

impl<U> FilteredListener<U> {
    pub fn new(
        predicate: impl Fn(&U) -> bool + Send + Sync + 'static,
        inner: Arc<dyn UpdateListener<U>>,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            inner,
        }
    }
}

impl<U> UpdateListener<U> for FilteredListener<U> {
    fn on_update(&self, update: &U, source: &DeviceName) {
        if (self.predicate)(update) {
            self.inner.on_update(update, source);
        }
    }
}
