//! Force-feedback devices.
//!
//! A force device reports the force it is currently exerting, the surface
//! contact point of the probe, and device errors, and accepts haptic
//! requests: switching the modeled surface on and off and sending
//! point-force fields.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConnectParams;
use crate::dispatcher::{ListenerRegistry, UpdateDispatcher, UpdateListener};
use crate::engine::Engine;
use crate::proxy::{DeviceError, DeviceProxy};
use crate::update::Timestamp;

/// Force currently exerted by the device, in newtons.
#[derive(Clone, Debug, PartialEq)]
pub struct ForceUpdate {
    pub time: Timestamp,
    pub force: [f64; 3],
}

/// Where the probe touches the modeled surface.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceContactUpdate {
    pub time: Timestamp,
    pub pos: [f64; 3],
    /// Surface normal orientation as a quaternion `[x, y, z, w]`.
    pub quat: [f64; 4],
}

/// An error raised by the haptic device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForceErrorUpdate {
    pub time: Timestamp,
    pub code: i32,
}

/// Telemetry drained from a force-device connection.
#[derive(Clone, Debug)]
pub enum ForceEvent {
    Force(ForceUpdate),
    SurfaceContact(SurfaceContactUpdate),
    Error(ForceErrorUpdate),
}

/// Engine connection for a force-feedback device.
pub trait ForceEngine: Engine<Event = ForceEvent> {
    /// Starts rendering the modeled surface. Best effort.
    fn start_surface(&mut self) -> bool;

    /// Stops rendering the modeled surface.
    fn stop_surface(&mut self) -> bool;

    /// Sends a point force field: `force + jacobian * (p - origin)`
    /// inside `radius` of `origin`.
    fn send_force_field(
        &mut self,
        origin: [f64; 3],
        force: [f64; 3],
        jacobian: [[f64; 3]; 3],
        radius: f64,
    ) -> bool;

    /// Cancels the active force field.
    fn stop_force_field(&mut self) -> bool;
}

/// Client proxy for one force-feedback device.
pub struct ForceDevice<E: ForceEngine> {
    proxy: DeviceProxy<E>,
    force: Arc<UpdateDispatcher<ForceUpdate>>,
    contact: Arc<UpdateDispatcher<SurfaceContactUpdate>>,
    errors: Arc<UpdateDispatcher<ForceErrorUpdate>>,
}

impl<E: ForceEngine + 'static> ForceDevice<E> {
    /// Opens the force device named in `params` and starts polling it.
    pub fn connect(params: &ConnectParams) -> Result<Self, DeviceError> {
        let engine = E::connect(params).map_err(|source| DeviceError::Instantiation {
            name: params.name.clone(),
            source,
        })?;
        Ok(Self::from_engine(engine, params))
    }

    /// Wraps an already-open connection and starts polling it.
    pub fn from_engine(engine: E, params: &ConnectParams) -> Self {
        let force = Arc::new(UpdateDispatcher::new("force"));
        let contact = Arc::new(UpdateDispatcher::new("surface-contact"));
        let errors = Arc::new(UpdateDispatcher::new("force-error"));

        let registries: Vec<Arc<dyn ListenerRegistry>> =
            vec![force.clone(), contact.clone(), errors.clone()];
        let (f, c, err) = (force.clone(), contact.clone(), errors.clone());
        let proxy = DeviceProxy::start(
            params.name.clone(),
            engine,
            registries,
            move |event, source| match event {
                ForceEvent::Force(u) => f.dispatch(&u, source),
                ForceEvent::SurfaceContact(u) => c.dispatch(&u, source),
                ForceEvent::Error(u) => err.dispatch(&u, source),
            },
            Duration::from_millis(params.poll_period_ms),
        );

        Self {
            proxy,
            force,
            contact,
            errors,
        }
    }

    pub fn add_force_listener(&self, listener: Arc<dyn UpdateListener<ForceUpdate>>) {
        self.force.register(listener);
    }

    pub fn remove_force_listener(&self, listener: &Arc<dyn UpdateListener<ForceUpdate>>) -> bool {
        self.force.unregister(listener)
    }

    pub fn add_contact_listener(&self, listener: Arc<dyn UpdateListener<SurfaceContactUpdate>>) {
        self.contact.register(listener);
    }

    pub fn remove_contact_listener(
        &self,
        listener: &Arc<dyn UpdateListener<SurfaceContactUpdate>>,
    ) -> bool {
        self.contact.unregister(listener)
    }

    pub fn add_error_listener(&self, listener: Arc<dyn UpdateListener<ForceErrorUpdate>>) {
        self.errors.register(listener);
    }

    pub fn remove_error_listener(
        &self,
        listener: &Arc<dyn UpdateListener<ForceErrorUpdate>>,
    ) -> bool {
        self.errors.unregister(listener)
    }

    /// Starts rendering the modeled surface.
    pub fn start_surface(&self) -> bool {
        self.proxy.gate().with(|e| e.start_surface())
    }

    /// Stops rendering the modeled surface.
    pub fn stop_surface(&self) -> bool {
        self.proxy.gate().with(|e| e.stop_surface())
    }

    /// Sends a point force field centered at `origin`.
    pub fn send_force_field(
        &self,
        origin: [f64; 3],
        force: [f64; 3],
        jacobian: [[f64; 3]; 3],
        radius: f64,
    ) -> bool {
        self.proxy
            .gate()
            .with(|e| e.send_force_field(origin, force, jacobian, radius))
    }

    /// Cancels the active force field.
    pub fn stop_force_field(&self) -> bool {
        self.proxy.gate().with(|e| e.stop_force_field())
    }
}

impl<E: ForceEngine> Deref for ForceDevice<E> {
    type Target = DeviceProxy<E>;

    fn deref(&self) -> &DeviceProxy<E> {
        &self.proxy
    }
}
