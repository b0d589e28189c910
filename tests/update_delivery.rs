//! End-to-end delivery tests: scripted engine → poll loop → dispatchers
//! → buffered listeners, across the device kinds.

use std::sync::Arc;
use std::sync::Once;
use std::time::{Duration, Instant};

use senslink::engines::scripted::{EngineProbe, ScriptedEngine};
use senslink::{
    AnalogOutputDevice, AnalogUpdate, BufferMode, BufferedListener, ButtonDevice, ButtonUpdate,
    ChannelReply, ConnectParams, ForceDevice, ForceErrorUpdate, ForceEvent, ForceUpdate,
    FunctionGenerator, GeneratorChannel, GeneratorEvent, GeneratorFunction, PositionUpdate,
    SurfaceContactUpdate, TextReceiver, TextSeverity, TextUpdate, Timestamp, TrackerDevice,
    TrackerEvent, UpdateListener,
};

static INIT_TRACING: Once = Once::new();

fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Connection parameters with a fast poll period for tests.
fn params(name: &str) -> ConnectParams {
    let mut p = ConnectParams::new(name.parse().expect("valid name"));
    p.poll_period_ms = 1;
    p
}

fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

fn position(t: i64) -> PositionUpdate {
    PositionUpdate {
        time: Timestamp::new(t, 0),
        sensor: 0,
        pos: [t as f64, 0.0, 0.0],
        quat: [0.0, 0.0, 0.0, 1.0],
    }
}

fn scripted_tracker(
    name: &str,
) -> (
    TrackerDevice<ScriptedEngine<TrackerEvent>>,
    EngineProbe<TrackerEvent>,
) {
    let (engine, probe) = ScriptedEngine::live_pair();
    let tracker = TrackerDevice::from_engine(engine, &params(name));
    (tracker, probe)
}

#[test]
fn all_mode_buffer_sees_every_update_once() {
    init_test_tracing();
    let (tracker, probe) = scripted_tracker("Tracker0@localhost");

    let buf = Arc::new(BufferedListener::<PositionUpdate>::keep_all());
    tracker.add_position_listener(buf.clone());

    probe.feed_all([
        TrackerEvent::Position(position(1)),
        TrackerEvent::Position(position(2)),
        TrackerEvent::Position(position(3)),
    ]);
    assert!(wait_until(Duration::from_secs(2), || buf.len() == 3));

    tracker.stop_running();

    assert_eq!(buf.drain(), vec![position(1), position(2), position(3)]);
    assert!(buf.drain().is_empty());
}

#[test]
fn last_mode_buffer_keeps_returning_the_newest() {
    init_test_tracing();
    let (tracker, probe) = scripted_tracker("Tracker1@localhost");

    let buf = Arc::new(BufferedListener::<PositionUpdate>::latest_only());
    tracker.add_position_listener(buf.clone());

    probe.feed_all([
        TrackerEvent::Position(position(1)),
        TrackerEvent::Position(position(2)),
        TrackerEvent::Position(position(3)),
    ]);
    assert!(wait_until(Duration::from_secs(2), || {
        buf.peek_last() == Some(position(3))
    }));

    tracker.stop_running();

    assert_eq!(buf.drain(), vec![position(3)]);
    assert_eq!(buf.drain(), vec![position(3)]);
    assert_eq!(buf.peek_last(), Some(position(3)));
}

#[test]
fn tracker_routes_each_category_to_its_own_listeners() {
    init_test_tracing();
    let (tracker, probe) = scripted_tracker("Tracker2@localhost");

    let positions = Arc::new(BufferedListener::<PositionUpdate>::keep_all());
    let velocities = Arc::new(BufferedListener::<senslink::VelocityUpdate>::keep_all());
    tracker.add_position_listener(positions.clone());
    tracker.add_velocity_listener(velocities.clone());

    probe.feed_all([
        TrackerEvent::Position(position(1)),
        TrackerEvent::Velocity(senslink::VelocityUpdate {
            time: Timestamp::new(1, 500_000),
            sensor: 0,
            vel: [0.1, 0.0, 0.0],
            vel_quat: [0.0, 0.0, 0.0, 1.0],
            vel_quat_dt: 0.01,
        }),
        TrackerEvent::Position(position(2)),
    ]);
    assert!(wait_until(Duration::from_secs(2), || {
        positions.len() == 2 && velocities.len() == 1
    }));

    tracker.stop_running();
    assert_eq!(positions.drain(), vec![position(1), position(2)]);
    assert_eq!(velocities.drain().len(), 1);
}

#[test]
fn listeners_receive_the_device_name() {
    init_test_tracing();
    let (tracker, probe) = scripted_tracker("Head@vr-host:4500");

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    tracker.add_position_listener(Arc::new(
        move |_: &PositionUpdate, source: &senslink::DeviceName| {
            sink.lock().unwrap().push(source.to_string());
        },
    ));

    probe.feed(TrackerEvent::Position(position(1)));
    assert!(wait_until(Duration::from_secs(2), || {
        !seen.lock().unwrap().is_empty()
    }));
    tracker.stop_running();

    assert_eq!(seen.lock().unwrap()[0], "Head@vr-host:4500");
}

#[test]
fn button_device_delivers_edges_in_order() {
    init_test_tracing();
    let (engine, probe) = ScriptedEngine::live_pair();
    let buttons = ButtonDevice::from_engine(engine, &params("Button0@localhost"));

    let buf = Arc::new(BufferedListener::<ButtonUpdate>::keep_all());
    buttons.add_button_listener(buf.clone());

    probe.feed_all([
        ButtonUpdate {
            time: Timestamp::new(1, 0),
            button: 0,
            pressed: true,
        },
        ButtonUpdate {
            time: Timestamp::new(2, 0),
            button: 0,
            pressed: false,
        },
    ]);
    assert!(wait_until(Duration::from_secs(2), || buf.len() == 2));
    buttons.stop_running();

    let edges = buf.drain();
    assert!(edges[0].pressed);
    assert!(!edges[1].pressed);
}

#[test]
fn analog_device_reports_channel_bank_and_count() {
    init_test_tracing();
    let (engine, probe) = ScriptedEngine::live_pair();
    let analog = senslink::AnalogDevice::from_engine(engine, &params("Analog0@localhost"));
    probe.set_num_active_channels(4);

    let buf = Arc::new(BufferedListener::<AnalogUpdate>::latest_only());
    analog.add_analog_listener(buf.clone());

    probe.feed(AnalogUpdate {
        time: Timestamp::new(1, 0),
        channels: vec![0.25, -0.5, 0.0, 1.0],
    });
    assert!(wait_until(Duration::from_secs(2), || buf.peek_last().is_some()));

    assert_eq!(analog.num_active_channels(), 4);
    assert_eq!(analog.max_active_channels(), senslink::MAX_CHANNELS);
    analog.stop_running();

    assert_eq!(buf.drain()[0].channels, vec![0.25, -0.5, 0.0, 1.0]);
}

#[test]
fn analog_output_requests_are_best_effort() {
    init_test_tracing();
    let (engine, probe) = ScriptedEngine::live_pair();
    let out = AnalogOutputDevice::from_engine(engine, &params("AnalogOut0@localhost"));

    assert!(out.request_value_change(2, 0.75));
    assert!(out.request_value_change_all(&[0.0, 1.0]));

    // A transport hiccup surfaces as `false`, never as an error.
    probe.set_accept_requests(false);
    assert!(!out.request_value_change(2, 0.5));

    let requests = probe.requests();
    assert_eq!(
        requests,
        vec![
            "request_value_change(2, 0.75)".to_string(),
            "request_value_change_all([0.0, 1.0])".to_string(),
        ]
    );
    out.stop_running();
}

#[test]
fn force_device_routes_three_categories_and_sends_requests() {
    init_test_tracing();
    let (engine, probe) = ScriptedEngine::live_pair();
    let haptics = ForceDevice::from_engine(engine, &params("Phantom0@localhost"));

    let forces = Arc::new(BufferedListener::<ForceUpdate>::keep_all());
    let contacts = Arc::new(BufferedListener::<SurfaceContactUpdate>::keep_all());
    let errors = Arc::new(BufferedListener::<ForceErrorUpdate>::keep_all());
    haptics.add_force_listener(forces.clone());
    haptics.add_contact_listener(contacts.clone());
    haptics.add_error_listener(errors.clone());

    probe.feed_all([
        ForceEvent::Force(ForceUpdate {
            time: Timestamp::new(1, 0),
            force: [0.0, 0.0, 1.5],
        }),
        ForceEvent::SurfaceContact(SurfaceContactUpdate {
            time: Timestamp::new(1, 100),
            pos: [0.1, 0.2, 0.3],
            quat: [0.0, 0.0, 0.0, 1.0],
        }),
        ForceEvent::Error(ForceErrorUpdate {
            time: Timestamp::new(2, 0),
            code: 3,
        }),
    ]);
    assert!(wait_until(Duration::from_secs(2), || {
        forces.len() == 1 && contacts.len() == 1 && errors.len() == 1
    }));

    assert!(haptics.start_surface());
    assert!(haptics.send_force_field(
        [0.0; 3],
        [0.0, 0.0, 2.0],
        [[0.0; 3]; 3],
        0.25,
    ));
    assert!(haptics.stop_force_field());
    assert!(haptics.stop_surface());

    haptics.stop_running();
    assert_eq!(errors.drain()[0].code, 3);
    let requests = probe.requests();
    assert_eq!(requests[0], "start_surface");
    assert_eq!(requests[3], "stop_surface");
}

#[test]
fn text_receiver_delivers_messages_with_severity() {
    init_test_tracing();
    let (engine, probe) = ScriptedEngine::live_pair();
    let console = TextReceiver::from_engine(engine, &params("Text0@localhost"));

    let buf = Arc::new(BufferedListener::<TextUpdate>::keep_all());
    console.add_text_listener(buf.clone());

    probe.feed_all([
        TextUpdate {
            time: Timestamp::new(1, 0),
            severity: TextSeverity::Normal,
            level: 0,
            message: "tracker calibrated".into(),
        },
        TextUpdate {
            time: Timestamp::new(2, 0),
            severity: TextSeverity::Error,
            level: 1,
            message: "sensor 2 dropped".into(),
        },
    ]);
    assert!(wait_until(Duration::from_secs(2), || buf.len() == 2));
    console.stop_running();

    let messages = buf.drain();
    assert_eq!(messages[0].severity, TextSeverity::Normal);
    assert_eq!(messages[1].message, "sensor 2 dropped");
    assert!(TextSeverity::Normal < TextSeverity::Error);
}

#[test]
fn function_generator_round_trips_channel_programs() {
    init_test_tracing();
    let (engine, probe) = ScriptedEngine::live_pair();
    let generator = FunctionGenerator::from_engine(engine, &params("FuncGen0@localhost"));

    let replies = Arc::new(BufferedListener::<ChannelReply>::keep_all());
    let starts = Arc::new(BufferedListener::<senslink::StartReply>::keep_all());
    generator.add_channel_listener(replies.clone());
    generator.add_start_listener(starts.clone());

    let channel = GeneratorChannel {
        function: GeneratorFunction::Script("sin(2*pi*f*t)".into()),
    };
    assert!(generator.set_channel(0, &channel));
    assert!(generator.request_channel(0));
    assert!(generator.request_start());
    assert!(generator.request_sample_rate(44_100.0));

    // Server answers arrive as regular updates.
    probe.feed_all([
        GeneratorEvent::Channel(ChannelReply {
            time: Timestamp::new(1, 0),
            index: 0,
            channel: channel.clone(),
        }),
        GeneratorEvent::Start(senslink::StartReply {
            time: Timestamp::new(1, 100),
            ok: true,
        }),
    ]);
    assert!(wait_until(Duration::from_secs(2), || {
        replies.len() == 1 && starts.len() == 1
    }));
    generator.stop_running();

    assert_eq!(replies.drain()[0].channel, channel);
    assert!(probe
        .requests()
        .iter()
        .any(|r| r.starts_with("request_sample_rate")));
}

#[test]
fn switching_modes_mid_stream_follows_the_retention_rules() {
    init_test_tracing();
    let (tracker, probe) = scripted_tracker("Tracker3@localhost");

    let buf = Arc::new(BufferedListener::<PositionUpdate>::latest_only());
    tracker.add_position_listener(buf.clone());

    probe.feed_all((1..=3).map(|t| TrackerEvent::Position(position(t))));
    assert!(wait_until(Duration::from_secs(2), || {
        buf.peek_last() == Some(position(3))
    }));

    buf.set_mode(BufferMode::All);
    probe.feed_all((4..=5).map(|t| TrackerEvent::Position(position(t))));
    assert!(wait_until(Duration::from_secs(2), || buf.len() == 3));
    tracker.stop_running();

    // The single retained LAST item leads the new ALL sequence.
    assert_eq!(buf.drain(), vec![position(3), position(4), position(5)]);
}

#[test]
fn panicking_listener_never_kills_the_poll_loop() {
    init_test_tracing();
    let (tracker, probe) = scripted_tracker("Tracker4@localhost");

    tracker.add_position_listener(Arc::new(
        |_: &PositionUpdate, _: &senslink::DeviceName| panic!("listener bug"),
    ));
    let buf = Arc::new(BufferedListener::<PositionUpdate>::keep_all());
    tracker.add_position_listener(buf.clone());

    probe.feed(TrackerEvent::Position(position(1)));
    assert!(wait_until(Duration::from_secs(2), || buf.len() == 1));

    // The loop is still draining after the panic.
    let drained = probe.mainloop_calls();
    probe.feed(TrackerEvent::Position(position(2)));
    assert!(wait_until(Duration::from_secs(2), || buf.len() == 2));
    assert!(probe.mainloop_calls() > drained);

    tracker.stop_running();
}

// Registering the same listener twice is legal and double-delivers.
#[test]
fn duplicate_listener_registration_double_delivers() {
    init_test_tracing();
    let (tracker, probe) = scripted_tracker("Tracker5@localhost");

    let buf = Arc::new(BufferedListener::<PositionUpdate>::keep_all());
    let listener: Arc<dyn UpdateListener<PositionUpdate>> = buf.clone();
    tracker.add_position_listener(listener.clone());
    tracker.add_position_listener(listener.clone());

    probe.feed(TrackerEvent::Position(position(1)));
    assert!(wait_until(Duration::from_secs(2), || buf.len() == 2));
    tracker.stop_running();

    assert_eq!(buf.drain(), vec![position(1), position(1)]);
}
