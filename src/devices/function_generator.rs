//! Function-generator devices.
//!
//! A function generator runs a waveform program per output channel. The
//! client programs channels and asks the server to start or stop; the
//! server answers every request with a reply message, which arrives as a
//! regular update through the corresponding listener category.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConnectParams;
use crate::dispatcher::{ListenerRegistry, UpdateDispatcher, UpdateListener};
use crate::engine::Engine;
use crate::proxy::{DeviceError, DeviceProxy};
use crate::update::Timestamp;

/// Waveform program for one channel.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum GeneratorFunction {
    /// Output nothing.
    #[default]
    Null,
    /// Interpreted script evaluated by the server.
    Script(String),
}

/// One output channel's configuration.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct GeneratorChannel {
    pub function: GeneratorFunction,
}

/// Server's answer to a channel query or change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelReply {
    pub time: Timestamp,
    pub index: u32,
    pub channel: GeneratorChannel,
}

/// Confirmation that generation started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartReply {
    pub time: Timestamp,
    pub ok: bool,
}

/// Confirmation that generation stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StopReply {
    pub time: Timestamp,
    pub ok: bool,
}

/// Server's answer to a sample-rate request.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleRateReply {
    pub time: Timestamp,
    pub rate: f64,
}

/// Error reported by the generator, with the channel it concerns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorErrorReply {
    pub time: Timestamp,
    pub code: i32,
    pub index: u32,
}

/// Telemetry drained from a function-generator connection.
#[derive(Clone, Debug)]
pub enum GeneratorEvent {
    Channel(ChannelReply),
    Start(StartReply),
    Stop(StopReply),
    SampleRate(SampleRateReply),
    Error(GeneratorErrorReply),
}

/// Engine connection for a function generator.
pub trait GeneratorEngine: Engine<Event = GeneratorEvent> {
    /// Programs one channel. Best effort.
    fn set_channel(&mut self, index: u32, channel: &GeneratorChannel) -> bool;

    /// Asks the server to report one channel's configuration.
    fn request_channel(&mut self, index: u32) -> bool;

    /// Asks the server to report every channel's configuration.
    fn request_all_channels(&mut self) -> bool;

    /// Asks the server to begin generating.
    fn request_start(&mut self) -> bool;

    /// Asks the server to stop generating.
    fn request_stop_generating(&mut self) -> bool;

    /// Asks the server to sample at `rate` Hz.
    fn request_sample_rate(&mut self, rate: f64) -> bool;
}

/// Client proxy for one function generator.
pub struct FunctionGenerator<E: GeneratorEngine> {
    proxy: DeviceProxy<E>,
    channel_replies: Arc<UpdateDispatcher<ChannelReply>>,
    start_replies: Arc<UpdateDispatcher<StartReply>>,
    stop_replies: Arc<UpdateDispatcher<StopReply>>,
    sample_rate_replies: Arc<UpdateDispatcher<SampleRateReply>>,
    error_replies: Arc<UpdateDispatcher<GeneratorErrorReply>>,
}

impl<E: GeneratorEngine + 'static> FunctionGenerator<E> {
    /// Opens the generator named in `params` and starts polling it.
    pub fn connect(params: &ConnectParams) -> Result<Self, DeviceError> {
        let engine = E::connect(params).map_err(|source| DeviceError::Instantiation {
            name: params.name.clone(),
            source,
        })?;
        Ok(Self::from_engine(engine, params))
    }

    /// Wraps an already-open connection and starts polling it.
    pub fn from_engine(engine: E, params: &ConnectParams) -> Self {
        let channel_replies = Arc::new(UpdateDispatcher::new("channel-reply"));
        let start_replies = Arc::new(UpdateDispatcher::new("start-reply"));
        let stop_replies = Arc::new(UpdateDispatcher::new("stop-reply"));
        let sample_rate_replies = Arc::new(UpdateDispatcher::new("sample-rate-reply"));
        let error_replies = Arc::new(UpdateDispatcher::new("generator-error"));

        let registries: Vec<Arc<dyn ListenerRegistry>> = vec![
            channel_replies.clone(),
            start_replies.clone(),
            stop_replies.clone(),
            sample_rate_replies.clone(),
            error_replies.clone(),
        ];
        let (ch, start, stop, rate, err) = (
            channel_replies.clone(),
            start_replies.clone(),
            stop_replies.clone(),
            sample_rate_replies.clone(),
            error_replies.clone(),
        );
        let proxy = DeviceProxy::start(
            params.name.clone(),
            engine,
            registries,
            move |event, source| match event {
                GeneratorEvent::Channel(u) => ch.dispatch(&u, source),
                GeneratorEvent::Start(u) => start.dispatch(&u, source),
                GeneratorEvent::Stop(u) => stop.dispatch(&u, source),
                GeneratorEvent::SampleRate(u) => rate.dispatch(&u, source),
                GeneratorEvent::Error(u) => err.dispatch(&u, source),
            },
            Duration::from_millis(params.poll_period_ms),
        );

        Self {
            proxy,
            channel_replies,
            start_replies,
            stop_replies,
            sample_rate_replies,
            error_replies,
        }
    }

    pub fn add_channel_listener(&self, listener: Arc<dyn UpdateListener<ChannelReply>>) {
        self.channel_replies.register(listener);
    }

    pub fn remove_channel_listener(&self, listener: &Arc<dyn UpdateListener<ChannelReply>>) -> bool {
        self.channel_replies.unregister(listener)
    }

    pub fn add_start_listener(&self, listener: Arc<dyn UpdateListener<StartReply>>) {
        self.start_replies.register(listener);
    }

    pub fn remove_start_listener(&self, listener: &Arc<dyn UpdateListener<StartReply>>) -> bool {
        self.start_replies.unregister(listener)
    }

    pub fn add_stop_listener(&self, listener: Arc<dyn UpdateListener<StopReply>>) {
        self.stop_replies.register(listener);
    }

    pub fn remove_stop_listener(&self, listener: &Arc<dyn UpdateListener<StopReply>>) -> bool {
        self.stop_replies.unregister(listener)
    }

    pub fn add_sample_rate_listener(&self, listener: Arc<dyn UpdateListener<SampleRateReply>>) {
        self.sample_rate_replies.register(listener);
    }

    pub fn remove_sample_rate_listener(
        &self,
        listener: &Arc<dyn UpdateListener<SampleRateReply>>,
    ) -> bool {
        self.sample_rate_replies.unregister(listener)
    }

    pub fn add_error_listener(&self, listener: Arc<dyn UpdateListener<GeneratorErrorReply>>) {
        self.error_replies.register(listener);
    }

    pub fn remove_error_listener(
        &self,
        listener: &Arc<dyn UpdateListener<GeneratorErrorReply>>,
    ) -> bool {
        self.error_replies.unregister(listener)
    }

    /// Programs one channel. The server confirms through the
    /// channel-reply listeners.
    pub fn set_channel(&self, index: u32, channel: &GeneratorChannel) -> bool {
        self.proxy.gate().with(|e| e.set_channel(index, channel))
    }

    /// Asks the server to report one channel's configuration.
    pub fn request_channel(&self, index: u32) -> bool {
        self.proxy.gate().with(|e| e.request_channel(index))
    }

    /// Asks the server to report every channel's configuration.
    pub fn request_all_channels(&self) -> bool {
        self.proxy.gate().with(|e| e.request_all_channels())
    }

    /// Asks the server to begin generating.
    pub fn request_start(&self) -> bool {
        self.proxy.gate().with(|e| e.request_start())
    }

    /// Asks the server to stop generating. (Distinct from
    /// [`stop_running`](DeviceProxy::stop_running), which tears down this
    /// client proxy.)
    pub fn request_stop_generating(&self) -> bool {
        self.proxy.gate().with(|e| e.request_stop_generating())
    }

    /// Asks the server to sample at `rate` Hz.
    pub fn request_sample_rate(&self, rate: f64) -> bool {
        self.proxy.gate().with(|e| e.request_sample_rate(rate))
    }
}

impl<E: GeneratorEngine> Deref for FunctionGenerator<E> {
    type Target = DeviceProxy<E>;

    fn deref(&self) -> &DeviceProxy<E> {
        &self.proxy
    }
}
