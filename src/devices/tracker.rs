//! Tracking devices: pose, velocity, and acceleration reports.
//!
//! A tracker carries one or more sensors; every record names the sensor it
//! belongs to. Positions are meters in the tracker's room frame,
//! orientations are unit quaternions `[x, y, z, w]`. Velocity and
//! acceleration reports carry the differential quaternion over
//! `quat_dt` seconds, matching what the engine's servers send.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConnectParams;
use crate::dispatcher::{ListenerRegistry, UpdateDispatcher, UpdateListener};
use crate::engine::Engine;
use crate::proxy::{DeviceError, DeviceProxy};
use crate::update::Timestamp;

/// One pose fix for a sensor.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionUpdate {
    pub time: Timestamp,
    pub sensor: i32,
    /// Position in meters.
    pub pos: [f64; 3],
    /// Orientation as a unit quaternion `[x, y, z, w]`.
    pub quat: [f64; 4],
}

/// Rate of change of a sensor's pose.
#[derive(Clone, Debug, PartialEq)]
pub struct VelocityUpdate {
    pub time: Timestamp,
    pub sensor: i32,
    /// Velocity in meters per second.
    pub vel: [f64; 3],
    /// Rotation over `vel_quat_dt` seconds, as a quaternion.
    pub vel_quat: [f64; 4],
    pub vel_quat_dt: f64,
}

/// Acceleration of a sensor's pose.
#[derive(Clone, Debug, PartialEq)]
pub struct AccelerationUpdate {
    pub time: Timestamp,
    pub sensor: i32,
    /// Acceleration in meters per second squared.
    pub acc: [f64; 3],
    /// Rotational acceleration over `acc_quat_dt` seconds.
    pub acc_quat: [f64; 4],
    pub acc_quat_dt: f64,
}

/// Telemetry drained from a tracker connection.
#[derive(Clone, Debug)]
pub enum TrackerEvent {
    Position(PositionUpdate),
    Velocity(VelocityUpdate),
    Acceleration(AccelerationUpdate),
}

/// Engine connection for a tracking device.
pub trait TrackerEngine: Engine<Event = TrackerEvent> {
    /// Asks the server to send reports at `rate` Hz. Best effort: `false`
    /// means the request could not be delivered right now.
    fn set_update_rate(&mut self, rate: f64) -> bool;
}

/// Client proxy for one tracking device.
pub struct TrackerDevice<E: TrackerEngine> {
    proxy: DeviceProxy<E>,
    position: Arc<UpdateDispatcher<PositionUpdate>>,
    velocity: Arc<UpdateDispatcher<VelocityUpdate>>,
    acceleration: Arc<UpdateDispatcher<AccelerationUpdate>>,
}

impl<E: TrackerEngine> std::fmt::Debug for TrackerDevice<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerDevice").finish_non_exhaustive()
    }
}

impl<E: TrackerEngine + 'static> TrackerDevice<E> {
    /// Opens the tracker named in `params` and starts polling it.
    pub fn connect(params: &ConnectParams) -> Result<Self, DeviceError> {
        let engine = E::connect(params).map_err(|source| DeviceError::Instantiation {
            name: params.name.clone(),
            source,
        })?;
        Ok(Self::from_engine(engine, params))
    }

    /// Wraps an already-open connection and starts polling it.
    pub fn from_engine(engine: E, params: &ConnectParams) -> Self {
        let position = Arc::new(UpdateDispatcher::new("position"));
        let velocity = Arc::new(UpdateDispatcher::new("velocity"));
        let acceleration = Arc::new(UpdateDispatcher::new("acceleration"));

        let registries: Vec<Arc<dyn ListenerRegistry>> = vec![
            position.clone(),
            velocity.clone(),
            acceleration.clone(),
        ];
        let (pos, vel, acc) = (position.clone(), velocity.clone(), acceleration.clone());
        let proxy = DeviceProxy::start(
            params.name.clone(),
            engine,
            registries,
            move |event, source| match event {
                TrackerEvent::Position(u) => pos.dispatch(&u, source),
                TrackerEvent::Velocity(u) => vel.dispatch(&u, source),
                TrackerEvent::Acceleration(u) => acc.dispatch(&u, source),
            },
            Duration::from_millis(params.poll_period_ms),
        );

        Self {
            proxy,
            position,
            velocity,
            acceleration,
        }
    }

    pub fn add_position_listener(&self, listener: Arc<dyn UpdateListener<PositionUpdate>>) {
        self.position.register(listener);
    }

    pub fn remove_position_listener(
        &self,
        listener: &Arc<dyn UpdateListener<PositionUpdate>>,
    ) -> bool {
        self.position.unregister(listener)
    }

    pub fn add_velocity_listener(&self, listener: Arc<dyn UpdateListener<VelocityUpdate>>) {
        self.velocity.register(listener);
    }

    pub fn remove_velocity_listener(
        &self,
        listener: &Arc<dyn UpdateListener<VelocityUpdate>>,
    ) -> bool {
        self.velocity.unregister(listener)
    }

    pub fn add_acceleration_listener(
        &self,
        listener: Arc<dyn UpdateListener<AccelerationUpdate>>,
    ) {
        self.acceleration.register(listener);
    }

    pub fn remove_acceleration_listener(
        &self,
        listener: &Arc<dyn UpdateListener<AccelerationUpdate>>,
    ) -> bool {
        self.acceleration.unregister(listener)
    }

    /// Asks the server to send tracker reports at `rate` Hz.
    pub fn set_update_rate(&self, rate: f64) -> bool {
        self.proxy.gate().with(|e| e.set_update_rate(rate))
    }
}

impl<E: TrackerEngine> Deref for TrackerDevice<E> {
    type Target = DeviceProxy<E>;

    fn deref(&self) -> &DeviceProxy<E> {
        &self.proxy
    }
}
