//! Update records and timestamps.
//!
//! Every device category delivers its telemetry as a small, immutable
//! *update record*: a [`Timestamp`] plus category-specific payload fields.
//! Records are created at the engine boundary when the poll loop drains
//! pending messages, and ownership of a clone passes to each listener
//! independently. Records are never mutated after creation.
//!
//! ## Time conventions
//! Engines report message time as whole seconds plus microseconds (wall
//! clock, as stamped by the device server). [`Timestamp`] keeps that exact
//! representation so no precision is lost, and converts on demand:
//! - [`Timestamp::to_system_time`] for interop with `std::time`,
//! - [`Timestamp::as_secs_f64`] for plotting / arithmetic.
//!
//! The concrete record types (position, velocity, button state, analog
//! channels, …) live with their device modules under [`crate::devices`].

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Engine-reported message time: seconds and microseconds since the Unix
/// epoch, as stamped by the device server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Whole seconds since the Unix epoch.
    pub secs: i64,
    /// Microseconds within the second (`0..1_000_000`).
    pub micros: u32,
}

impl Timestamp {
    /// Builds a timestamp from raw engine fields.
    pub fn new(secs: i64, micros: u32) -> Self {
        Self { secs, micros }
    }

    /// Builds a timestamp from fractional seconds since the epoch.
    pub fn from_secs_f64(t: f64) -> Self {
        let secs = t.floor() as i64;
        let micros = ((t - secs as f64) * 1_000_000.0).round() as u32;
        Self { secs, micros }
    }

    /// Fractional seconds since the epoch.
    pub fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + f64::from(self.micros) / 1_000_000.0
    }

    /// Converts to `SystemTime`. Pre-epoch stamps saturate to the epoch.
    pub fn to_system_time(&self) -> SystemTime {
        if self.secs < 0 {
            return UNIX_EPOCH;
        }
        UNIX_EPOCH + Duration::new(self.secs as u64, self.micros * 1_000)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.secs, self.micros)
    }
}
