//! Drives a scripted tracker and consumes its position stream poll-style
//! through a buffered listener.

use std::sync::Arc;
use std::time::Duration;

use senslink::engines::scripted::ScriptedEngine;
use senslink::{
    BufferedListener, ConnectParams, PositionUpdate, Timestamp, TrackerDevice, TrackerEvent,
    UpdateLogger,
};

fn main() {
    tracing_subscriber::fmt().init();

    let mut params = ConnectParams::new("Tracker0@localhost".parse().expect("valid name"));
    params.poll_period_ms = 10;

    let (engine, probe) = ScriptedEngine::live_pair();
    let tracker = TrackerDevice::from_engine(engine, &params);

    let positions = Arc::new(BufferedListener::<PositionUpdate>::keep_all());
    tracker.add_position_listener(positions.clone());
    tracker.add_position_listener(Arc::new(UpdateLogger::new()));

    // Feed a small circular motion, draining every few frames the way a
    // render loop would.
    for frame in 0u32..50 {
        let t = f64::from(frame) * 0.02;
        let angle = t * std::f64::consts::TAU;
        probe.feed(TrackerEvent::Position(PositionUpdate {
            time: Timestamp::from_secs_f64(t),
            sensor: 0,
            pos: [angle.cos(), angle.sin(), 0.0],
            quat: [0.0, 0.0, 0.0, 1.0],
        }));

        if frame % 10 == 9 {
            for update in positions.drain() {
                println!(
                    "{}: sensor {} at [{:+.2} {:+.2} {:+.2}]",
                    update.time, update.sensor, update.pos[0], update.pos[1], update.pos[2]
                );
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    tracker.stop_running();
    println!(
        "engine drained {} times, shut down {} time(s)",
        probe.mainloop_calls(),
        probe.shutdown_calls()
    );
}
