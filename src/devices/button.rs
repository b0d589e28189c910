//! Button devices: press/release edges per button index.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConnectParams;
use crate::dispatcher::{ListenerRegistry, UpdateDispatcher, UpdateListener};
use crate::engine::Engine;
use crate::proxy::{DeviceError, DeviceProxy};
use crate::update::Timestamp;

/// One button transition. Buttons are numbered from 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonUpdate {
    pub time: Timestamp,
    pub button: i32,
    pub pressed: bool,
}

/// Client proxy for one button device.
pub struct ButtonDevice<E: Engine<Event = ButtonUpdate>> {
    proxy: DeviceProxy<E>,
    buttons: Arc<UpdateDispatcher<ButtonUpdate>>,
}

impl<E: Engine<Event = ButtonUpdate> + 'static> ButtonDevice<E> {
    /// Opens the button device named in `params` and starts polling it.
    pub fn connect(params: &ConnectParams) -> Result<Self, DeviceError> {
        let engine = E::connect(params).map_err(|source| DeviceError::Instantiation {
            name: params.name.clone(),
            source,
        })?;
        Ok(Self::from_engine(engine, params))
    }

    /// Wraps an already-open connection and starts polling it.
    pub fn from_engine(engine: E, params: &ConnectParams) -> Self {
        let buttons = Arc::new(UpdateDispatcher::new("button"));

        let registries: Vec<Arc<dyn ListenerRegistry>> = vec![buttons.clone()];
        let dispatcher = buttons.clone();
        let proxy = DeviceProxy::start(
            params.name.clone(),
            engine,
            registries,
            move |update, source| dispatcher.dispatch(&update, source),
            Duration::from_millis(params.poll_period_ms),
        );

        Self { proxy, buttons }
    }

    pub fn add_button_listener(&self, listener: Arc<dyn UpdateListener<ButtonUpdate>>) {
        self.buttons.register(listener);
    }

    pub fn remove_button_listener(&self, listener: &Arc<dyn UpdateListener<ButtonUpdate>>) -> bool {
        self.buttons.unregister(listener)
    }
}

impl<E: Engine<Event = ButtonUpdate>> Deref for ButtonDevice<E> {
    type Target = DeviceProxy<E>;

    fn deref(&self) -> &DeviceProxy<E> {
        &self.proxy
    }
}
