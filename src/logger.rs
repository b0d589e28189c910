//! A ready-made listener that traces every update it receives.

use std::fmt::Debug;

use tracing::info;

use crate::config::DeviceName;
use crate::dispatcher::UpdateListener;

/// Logs each update at `info` level. Handy while bringing up a device.
pub struct UpdateLogger;

impl UpdateLogger {
    pub fn new() -> Self {
        UpdateLogger
    }
}

impl Default for UpdateLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: Debug> UpdateListener<U> for UpdateLogger {
    fn on_update(&self, update: &U, source: &DeviceName) {
        info!(device = %source, update = ?update, "update");
    }
}
