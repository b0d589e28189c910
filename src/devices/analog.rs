//! Analog devices: banks of continuous channels.
//!
//! An analog *input* reports the whole channel bank whenever any channel
//! changes. An analog *output* is the request-only mirror: it pushes
//! values to the server's channels and receives no telemetry.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConnectParams;
use crate::dispatcher::{ListenerRegistry, UpdateDispatcher, UpdateListener};
use crate::engine::{Engine, NoUpdate};
use crate::proxy::{DeviceError, DeviceProxy};
use crate::update::Timestamp;

/// Most channels an analog device can carry.
pub const MAX_CHANNELS: usize = 128;

/// A snapshot of every active channel of an analog device.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalogUpdate {
    pub time: Timestamp,
    /// Channel values, indexed by channel number.
    pub channels: Vec<f64>,
}

/// Engine connection for an analog input device.
pub trait AnalogEngine: Engine<Event = AnalogUpdate> {
    /// Number of channels the server is currently reporting.
    fn num_active_channels(&mut self) -> usize;
}

/// Engine connection for an analog output device.
pub trait AnalogOutputEngine: Engine<Event = NoUpdate> {
    /// Asks the server to drive one channel to `value`. Best effort.
    fn request_value_change(&mut self, channel: usize, value: f64) -> bool;

    /// Asks the server to drive channels `0..values.len()` at once.
    fn request_value_change_all(&mut self, values: &[f64]) -> bool;

    /// Number of channels the server exposes.
    fn num_active_channels(&mut self) -> usize;
}

/// Client proxy for one analog input device.
pub struct AnalogDevice<E: AnalogEngine> {
    proxy: DeviceProxy<E>,
    channels: Arc<UpdateDispatcher<AnalogUpdate>>,
}

impl<E: AnalogEngine + 'static> AnalogDevice<E> {
    /// Opens the analog device named in `params` and starts polling it.
    pub fn connect(params: &ConnectParams) -> Result<Self, DeviceError> {
        let engine = E::connect(params).map_err(|source| DeviceError::Instantiation {
            name: params.name.clone(),
            source,
        })?;
        Ok(Self::from_engine(engine, params))
    }

    /// Wraps an already-open connection and starts polling it.
    pub fn from_engine(engine: E, params: &ConnectParams) -> Self {
        let channels = Arc::new(UpdateDispatcher::new("analog"));

        let registries: Vec<Arc<dyn ListenerRegistry>> = vec![channels.clone()];
        let dispatcher = channels.clone();
        let proxy = DeviceProxy::start(
            params.name.clone(),
            engine,
            registries,
            move |update, source| dispatcher.dispatch(&update, source),
            Duration::from_millis(params.poll_period_ms),
        );

        Self { proxy, channels }
    }

    pub fn add_analog_listener(&self, listener: Arc<dyn UpdateListener<AnalogUpdate>>) {
        self.channels.register(listener);
    }

    pub fn remove_analog_listener(&self, listener: &Arc<dyn UpdateListener<AnalogUpdate>>) -> bool {
        self.channels.unregister(listener)
    }

    /// Number of channels the server is currently reporting.
    pub fn num_active_channels(&self) -> usize {
        self.proxy.gate().with(|e| e.num_active_channels())
    }

    /// Upper bound on the channel count, regardless of the server.
    pub fn max_active_channels(&self) -> usize {
        MAX_CHANNELS
    }
}

impl<E: AnalogEngine> Deref for AnalogDevice<E> {
    type Target = DeviceProxy<E>;

    fn deref(&self) -> &DeviceProxy<E> {
        &self.proxy
    }
}

/// Client proxy for one analog output device.
///
/// Request-only: the poll loop still runs (the engine needs its
/// housekeeping drained) but no updates are ever delivered.
pub struct AnalogOutputDevice<E: AnalogOutputEngine> {
    proxy: DeviceProxy<E>,
}

impl<E: AnalogOutputEngine + 'static> AnalogOutputDevice<E> {
    /// Opens the analog output named in `params` and starts polling it.
    pub fn connect(params: &ConnectParams) -> Result<Self, DeviceError> {
        let engine = E::connect(params).map_err(|source| DeviceError::Instantiation {
            name: params.name.clone(),
            source,
        })?;
        Ok(Self::from_engine(engine, params))
    }

    /// Wraps an already-open connection and starts polling it.
    pub fn from_engine(engine: E, params: &ConnectParams) -> Self {
        let proxy = DeviceProxy::start(
            params.name.clone(),
            engine,
            Vec::new(),
            |update, _| match update {},
            Duration::from_millis(params.poll_period_ms),
        );
        Self { proxy }
    }

    /// Asks the server to drive `channel` to `value`. Returns `false` if
    /// the request could not be delivered right now.
    pub fn request_value_change(&self, channel: usize, value: f64) -> bool {
        self.proxy.gate().with(|e| e.request_value_change(channel, value))
    }

    /// Asks the server to drive channels `0..values.len()` in one
    /// message.
    pub fn request_value_change_all(&self, values: &[f64]) -> bool {
        self.proxy.gate().with(|e| e.request_value_change_all(values))
    }

    /// Number of channels the server exposes.
    pub fn num_active_channels(&self) -> usize {
        self.proxy.gate().with(|e| e.num_active_channels())
    }
}

impl<E: AnalogOutputEngine> Deref for AnalogOutputDevice<E> {
    type Target = DeviceProxy<E>;

    fn deref(&self) -> &DeviceProxy<E> {
        &self.proxy
    }
}
