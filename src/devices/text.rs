//! Text streams: human-readable messages from a device server.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConnectParams;
use crate::dispatcher::{ListenerRegistry, UpdateDispatcher, UpdateListener};
use crate::engine::Engine;
use crate::proxy::{DeviceError, DeviceProxy};
use crate::update::Timestamp;

/// How serious a text message is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TextSeverity {
    Normal,
    Warning,
    Error,
}

/// One text message. `level` refines the severity; higher is more
/// important within its class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextUpdate {
    pub time: Timestamp,
    pub severity: TextSeverity,
    pub level: i32,
    pub message: String,
}

/// Client proxy for one text stream.
pub struct TextReceiver<E: Engine<Event = TextUpdate>> {
    proxy: DeviceProxy<E>,
    messages: Arc<UpdateDispatcher<TextUpdate>>,
}

impl<E: Engine<Event = TextUpdate> + 'static> TextReceiver<E> {
    /// Opens the text stream named in `params` and starts polling it.
    pub fn connect(params: &ConnectParams) -> Result<Self, DeviceError> {
        let engine = E::connect(params).map_err(|source| DeviceError::Instantiation {
            name: params.name.clone(),
            source,
        })?;
        Ok(Self::from_engine(engine, params))
    }

    /// Wraps an already-open connection and starts polling it.
    pub fn from_engine(engine: E, params: &ConnectParams) -> Self {
        let messages = Arc::new(UpdateDispatcher::new("text"));

        let registries: Vec<Arc<dyn ListenerRegistry>> = vec![messages.clone()];
        let dispatcher = messages.clone();
        let proxy = DeviceProxy::start(
            params.name.clone(),
            engine,
            registries,
            move |update, source| dispatcher.dispatch(&update, source),
            Duration::from_millis(params.poll_period_ms),
        );

        Self { proxy, messages }
    }

    pub fn add_text_listener(&self, listener: Arc<dyn UpdateListener<TextUpdate>>) {
        self.messages.register(listener);
    }

    pub fn remove_text_listener(&self, listener: &Arc<dyn UpdateListener<TextUpdate>>) -> bool {
        self.messages.unregister(listener)
    }
}

impl<E: Engine<Event = TextUpdate>> Deref for TextReceiver<E> {
    type Target = DeviceProxy<E>;

    fn deref(&self) -> &DeviceProxy<E> {
        &self.proxy
    }
}
